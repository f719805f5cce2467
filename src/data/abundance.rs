//! Abundance records for chemical and taxonomic measurements.

use crate::data::table::Table;
use serde::{Deserialize, Serialize};

/// Chemical-abundance measurement categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmicsCategory {
    Metabolomics,
    Lipidomics,
    Proteomics,
}

impl OmicsCategory {
    /// All categories, in display order.
    pub fn all() -> [OmicsCategory; 3] {
        [Self::Metabolomics, Self::Lipidomics, Self::Proteomics]
    }

    /// Descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metabolomics => "metabolomics",
            Self::Lipidomics => "lipidomics",
            Self::Proteomics => "proteomics",
        }
    }

    /// Column holding the entity identifier in this category's table.
    pub fn entity_column(&self) -> &'static str {
        match self {
            Self::Metabolomics => "compound_name",
            Self::Lipidomics => "lipid_species",
            Self::Proteomics => "product",
        }
    }

    /// Column holding the abundance value in this category's table.
    pub fn value_column(&self) -> &'static str {
        match self {
            Self::Metabolomics => "peak_area",
            Self::Lipidomics => "area",
            Self::Proteomics => "abundance",
        }
    }
}

/// Taxonomic classification tools, each backed by its own abundance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomicTool {
    Gottcha,
    Kraken,
    Centrifuge,
    Contigs,
}

impl TaxonomicTool {
    /// All tools, in display order.
    pub fn all() -> [TaxonomicTool; 4] {
        [Self::Gottcha, Self::Kraken, Self::Centrifuge, Self::Contigs]
    }

    /// Descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gottcha => "gottcha",
            Self::Kraken => "kraken",
            Self::Centrifuge => "centrifuge",
            Self::Contigs => "contigs",
        }
    }

    /// Column holding the taxon identifier in this tool's table.
    pub fn entity_column(&self) -> &'static str {
        match self {
            Self::Gottcha => "label",
            Self::Kraken => "name",
            Self::Centrifuge | Self::Contigs => "lineage",
        }
    }
}

/// Taxonomic classification levels, ordered from broadest to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Superkingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// All ranks, broadest first.
    pub fn all() -> [Rank; 7] {
        [
            Self::Superkingdom,
            Self::Phylum,
            Self::Class,
            Self::Order,
            Self::Family,
            Self::Genus,
            Self::Species,
        ]
    }

    /// Descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superkingdom => "superkingdom",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Order => "order",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Species => "species",
        }
    }

    /// Parse a rank label; unknown labels yield `None` and the record is skipped.
    pub fn parse(label: &str) -> Option<Rank> {
        match label {
            "superkingdom" => Some(Self::Superkingdom),
            "phylum" => Some(Self::Phylum),
            "class" => Some(Self::Class),
            "order" => Some(Self::Order),
            "family" => Some(Self::Family),
            "genus" => Some(Self::Genus),
            "species" => Some(Self::Species),
            _ => None,
        }
    }
}

/// Category-specific metadata attached to an abundance record.
///
/// A closed set of variants, one per measurement category; missing text fields
/// are empty strings and missing counts are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum EntityMetadata {
    Metabolite {
        common_name: String,
        molecular_formula: String,
        chebi_id: String,
        kegg_id: String,
    },
    Lipid {
        lipid_class: String,
        lipid_category: String,
    },
    Protein {
        ec_number: String,
        pfam: String,
        ko: String,
        cog: String,
        gene_count: i64,
        unique_peptide_count: i64,
    },
    Taxon {
        rank: Rank,
    },
}

/// One abundance measurement: an entity observed in a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbundanceRecord {
    pub sample_id: String,
    pub entity_id: String,
    pub rank: Option<Rank>,
    pub abundance: f64,
    pub metadata: EntityMetadata,
}

impl AbundanceRecord {
    /// Parse an omics table into records.
    ///
    /// Rows with a missing entity id or a missing/non-finite abundance are
    /// dropped; metadata columns are optional.
    pub fn from_omics_table(table: &Table, category: OmicsCategory) -> Vec<AbundanceRecord> {
        let mut records = Vec::new();
        for row in 0..table.n_rows() {
            let Some(sample_id) = table.text(row, "sample_id") else {
                continue;
            };
            let Some(entity_id) = table.text(row, category.entity_column()) else {
                continue;
            };
            let Some(abundance) = table.numeric(row, category.value_column()) else {
                continue;
            };
            if !abundance.is_finite() {
                continue;
            }
            let metadata = match category {
                OmicsCategory::Metabolomics => EntityMetadata::Metabolite {
                    common_name: table.text_or_empty(row, "common_name"),
                    molecular_formula: table.text_or_empty(row, "molecular_formula"),
                    chebi_id: table.text_or_empty(row, "chebi_id"),
                    kegg_id: table.text_or_empty(row, "kegg_id"),
                },
                OmicsCategory::Lipidomics => EntityMetadata::Lipid {
                    lipid_class: table.text_or_empty(row, "lipid_class"),
                    lipid_category: table.text_or_empty(row, "lipid_category"),
                },
                OmicsCategory::Proteomics => EntityMetadata::Protein {
                    ec_number: table.text_or_empty(row, "ec_number"),
                    pfam: table.text_or_empty(row, "pfam"),
                    ko: table.text_or_empty(row, "ko"),
                    cog: table.text_or_empty(row, "cog"),
                    gene_count: table.integer_or_zero(row, "gene_count"),
                    unique_peptide_count: table.integer_or_zero(row, "unique_peptide_count"),
                },
            };
            records.push(AbundanceRecord {
                sample_id: sample_id.to_string(),
                entity_id: entity_id.to_string(),
                rank: None,
                abundance,
                metadata,
            });
        }
        records
    }

    /// Parse a taxonomic table into records.
    ///
    /// Rows whose rank label is not one of the seven known ranks are dropped,
    /// as are rows with missing ids or non-finite abundances.
    pub fn from_taxonomic_table(table: &Table, tool: TaxonomicTool) -> Vec<AbundanceRecord> {
        let mut records = Vec::new();
        for row in 0..table.n_rows() {
            let Some(sample_id) = table.text(row, "sample_id") else {
                continue;
            };
            let Some(entity_id) = table.text(row, tool.entity_column()) else {
                continue;
            };
            let Some(rank) = table.text(row, "rank").and_then(Rank::parse) else {
                continue;
            };
            let Some(abundance) = table.numeric(row, "abundance") else {
                continue;
            };
            if !abundance.is_finite() {
                continue;
            }
            records.push(AbundanceRecord {
                sample_id: sample_id.to_string(),
                entity_id: entity_id.to_string(),
                rank: Some(rank),
                abundance,
                metadata: EntityMetadata::Taxon { rank },
            });
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::{Table, TableKind};

    fn omics_table(tsv: &str) -> Table {
        Table::from_tsv_str(TableKind::Omics(OmicsCategory::Metabolomics), tsv).unwrap()
    }

    #[test]
    fn test_rank_order() {
        assert!(Rank::Superkingdom < Rank::Species);
        assert_eq!(Rank::parse("genus"), Some(Rank::Genus));
        assert_eq!(Rank::parse("strain"), None);
    }

    #[test]
    fn test_omics_parsing_drops_bad_rows() {
        let table = omics_table(
            "sample_id\tcompound_name\tpeak_area\tmolecular_formula\n\
             s1\tGlucose\t10.0\tC6H12O6\n\
             s2\t\t5.0\tC6H12O6\n\
             s3\tGlucose\tNA\tC6H12O6\n",
        );
        let records = AbundanceRecord::from_omics_table(&table, OmicsCategory::Metabolomics);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_id, "Glucose");
        assert_eq!(
            records[0].metadata,
            EntityMetadata::Metabolite {
                common_name: String::new(),
                molecular_formula: "C6H12O6".to_string(),
                chebi_id: String::new(),
                kegg_id: String::new(),
            }
        );
    }

    #[test]
    fn test_taxonomic_parsing_skips_unknown_ranks() {
        let table = Table::from_tsv_str(
            TableKind::Taxonomic(TaxonomicTool::Kraken),
            "sample_id\tname\trank\tabundance\n\
             s1\tEscherichia coli\tspecies\t0.4\n\
             s1\tEscherichia\tgenus\t0.5\n\
             s1\tsomething\tstrain\t0.1\n",
        )
        .unwrap();
        let records = AbundanceRecord::from_taxonomic_table(&table, TaxonomicTool::Kraken);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rank, Some(Rank::Species));
        assert_eq!(records[1].rank, Some(Rank::Genus));
    }
}
