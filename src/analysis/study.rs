//! Study analysis orchestration.
//!
//! Builds the full cached unit for one study: per-variable physical
//! comparisons, omics and taxonomic top-10 and outlier lists, an ecosystem
//! summary, and per-sample map locations. Per-variable and per-category
//! failures are isolated in place; only a study with zero samples aborts the
//! request.

use crate::analysis::{detect_outliers, top_by_mean_abundance, EntityComparison, RankedEntity};
use crate::config::{CompendiumBaseline, EngineConfig};
use crate::data::{
    AbundanceRecord, OmicsCategory, Rank, Sample, SampleTable, TableKind, TableSource,
    TaxonomicTool, ECOSYSTEM_LABELS,
};
use crate::error::{CompendiumError, Result};
use crate::stats::{cliffs_delta, describe, mann_whitney_u, sample_mean_std, DescriptiveStats};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Study-vs-compendium comparison for one physical variable.
///
/// The descriptive compendium baseline is computed per the configured
/// [`CompendiumBaseline`]; the significance test always runs on raw pooled
/// values from all other samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableComparison {
    /// Descriptive statistics over the study subset.
    pub study: DescriptiveStats,
    pub compendium_mean: f64,
    pub compendium_std: f64,
    /// Number of compendium studies contributing at least one value.
    pub compendium_study_count: usize,
    pub p_value: f64,
    pub significant: bool,
    pub effect_size: f64,
}

/// A physical-variable slot: a comparison, or the error that replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VariableSlot {
    Ok(VariableComparison),
    Error { error: String },
}

impl VariableSlot {
    /// The comparison, if this slot computed successfully.
    pub fn as_ok(&self) -> Option<&VariableComparison> {
        match self {
            Self::Ok(comparison) => Some(comparison),
            Self::Error { .. } => None,
        }
    }
}

/// Top-10 and outlier lists per omics category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmicsBlock {
    pub top10: BTreeMap<OmicsCategory, Vec<RankedEntity>>,
    pub outliers: BTreeMap<OmicsCategory, Vec<EntityComparison>>,
}

/// Top-10 and outlier lists per taxonomic tool and rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomicBlock {
    pub top10: BTreeMap<TaxonomicTool, BTreeMap<Rank, Vec<RankedEntity>>>,
    pub outliers: BTreeMap<TaxonomicTool, BTreeMap<Rank, Vec<EntityComparison>>>,
}

/// Ecosystem label summary over a study's samples.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EcosystemSummary {
    /// Distinct values per label column, sorted.
    pub values: BTreeMap<String, Vec<String>>,
    /// Most frequent value per label column.
    pub most_common: BTreeMap<String, String>,
    /// Per-value sample counts per label column.
    pub sample_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

/// One sample's location on the study map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleLocation {
    pub sample_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ecosystem: Option<String>,
}

/// Locations of all study samples with finite coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapData {
    pub locations: Vec<SampleLocation>,
}

/// The cached analysis unit for one study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyAnalysis {
    pub study_id: String,
    pub sample_count: usize,
    pub physical: BTreeMap<String, VariableSlot>,
    pub omics: OmicsBlock,
    pub taxonomic: TaxonomicBlock,
    pub ecosystem: EcosystemSummary,
    pub map_data: MapData,
}

/// Compute the full analysis for one study against the rest of the
/// collection.
///
/// A study with no samples is fatal (`StudyNotFound`); everything below that
/// is recorded in place and never aborts sibling slots.
pub fn compute_study_analysis(
    source: &dyn TableSource,
    samples: &SampleTable,
    study_id: &str,
    config: &EngineConfig,
) -> Result<StudyAnalysis> {
    let study_samples = samples.study_samples(study_id);
    if study_samples.is_empty() {
        return Err(CompendiumError::StudyNotFound(study_id.to_string()));
    }
    let compendium_samples = samples.compendium_samples(study_id);
    let study_sample_ids: HashSet<&str> =
        study_samples.iter().map(|s| s.sample_id.as_str()).collect();
    log::info!(
        "analyzing study {study_id}: {} study samples, {} compendium samples",
        study_samples.len(),
        compendium_samples.len()
    );

    let mut physical = BTreeMap::new();
    for variable in &config.physical_variables {
        match compare_physical_variable(variable, &study_samples, &compendium_samples, config) {
            Ok(Some(comparison)) => {
                physical.insert(variable.clone(), VariableSlot::Ok(comparison));
            }
            Ok(None) => {
                log::debug!("skipping '{variable}' for study {study_id}: no data");
            }
            Err(e) => {
                log::warn!("error processing '{variable}' for study {study_id}: {e}");
                physical.insert(
                    variable.clone(),
                    VariableSlot::Error {
                        error: e.to_string(),
                    },
                );
            }
        }
    }

    let mut omics = OmicsBlock {
        top10: BTreeMap::new(),
        outliers: BTreeMap::new(),
    };
    for category in OmicsCategory::all() {
        let (top10, outliers) =
            match analyze_omics_category(source, category, &study_sample_ids, config) {
                Ok(result) => result,
                Err(e) => {
                    log::error!(
                        "error processing {} for study {study_id}: {e}",
                        category.as_str()
                    );
                    (Vec::new(), Vec::new())
                }
            };
        omics.top10.insert(category, top10);
        omics.outliers.insert(category, outliers);
    }

    let mut taxonomic = TaxonomicBlock {
        top10: BTreeMap::new(),
        outliers: BTreeMap::new(),
    };
    for tool in TaxonomicTool::all() {
        let (top10, outliers) =
            match analyze_taxonomic_tool(source, tool, &study_sample_ids, config) {
                Ok(result) => result,
                Err(e) => {
                    log::error!(
                        "error processing {} for study {study_id}: {e}",
                        tool.as_str()
                    );
                    (BTreeMap::new(), BTreeMap::new())
                }
            };
        taxonomic.top10.insert(tool, top10);
        taxonomic.outliers.insert(tool, outliers);
    }

    Ok(StudyAnalysis {
        study_id: study_id.to_string(),
        sample_count: study_samples.len(),
        physical,
        omics,
        taxonomic,
        ecosystem: summarize_ecosystem(&study_samples),
        map_data: collect_map_data(&study_samples),
    })
}

/// Compare one physical variable between study and compendium.
///
/// Returns `None` when the study subset has no values or no compendium study
/// contributes any (the variable is skipped, not an error).
fn compare_physical_variable(
    variable: &str,
    study_samples: &[&Sample],
    compendium_samples: &[&Sample],
    config: &EngineConfig,
) -> Result<Option<VariableComparison>> {
    let study_values: Vec<f64> = study_samples
        .iter()
        .filter_map(|s| s.physical.get(variable))
        .copied()
        .collect();
    if study_values.is_empty() {
        return Ok(None);
    }

    // Pool compendium values, and in parallel collect them per study for the
    // study-means baseline.
    let mut pooled = Vec::new();
    let mut per_study: HashMap<&str, Vec<f64>> = HashMap::new();
    for sample in compendium_samples {
        if let Some(&value) = sample.physical.get(variable) {
            pooled.push(value);
            per_study
                .entry(sample.study_id.as_str())
                .or_default()
                .push(value);
        }
    }
    if per_study.is_empty() {
        return Ok(None);
    }
    let study_means: Vec<f64> = per_study
        .values()
        .map(|values| values.iter().sum::<f64>() / values.len() as f64)
        .collect();

    let study_stats = describe(&study_values)?;
    let (compendium_mean, compendium_std) = match config.baseline {
        CompendiumBaseline::StudyMeans => sample_mean_std(&study_means),
        CompendiumBaseline::Pooled => sample_mean_std(&pooled),
    };

    // The test runs on raw pooled values regardless of the descriptive
    // baseline (see EngineConfig::baseline).
    let test = mann_whitney_u(&study_values, &pooled, config.alpha);
    let effect_size = cliffs_delta(&study_values, &pooled);

    Ok(Some(VariableComparison {
        study: study_stats,
        compendium_mean,
        compendium_std,
        compendium_study_count: study_means.len(),
        p_value: test.p_value,
        significant: test.significant,
        effect_size,
    }))
}

fn analyze_omics_category(
    source: &dyn TableSource,
    category: OmicsCategory,
    study_sample_ids: &HashSet<&str>,
    config: &EngineConfig,
) -> Result<(Vec<RankedEntity>, Vec<EntityComparison>)> {
    let table = source.load(TableKind::Omics(category))?;
    let records = AbundanceRecord::from_omics_table(&table, category);
    let (study_records, compendium_records): (Vec<&AbundanceRecord>, Vec<&AbundanceRecord>) =
        records
            .iter()
            .partition(|r| study_sample_ids.contains(r.sample_id.as_str()));

    if study_records.is_empty() {
        log::debug!("no {} records for study subset", category.as_str());
        return Ok((Vec::new(), Vec::new()));
    }

    let top10 = top_by_mean_abundance(&study_records, config.top_k);
    let outliers = detect_outliers(&study_records, &compendium_records, config.alpha);
    Ok((top10, outliers))
}

type RankedByRank = BTreeMap<Rank, Vec<RankedEntity>>;
type OutliersByRank = BTreeMap<Rank, Vec<EntityComparison>>;

fn analyze_taxonomic_tool(
    source: &dyn TableSource,
    tool: TaxonomicTool,
    study_sample_ids: &HashSet<&str>,
    config: &EngineConfig,
) -> Result<(RankedByRank, OutliersByRank)> {
    let table = source.load(TableKind::Taxonomic(tool))?;
    let records = AbundanceRecord::from_taxonomic_table(&table, tool);
    let (study_records, compendium_records): (Vec<&AbundanceRecord>, Vec<&AbundanceRecord>) =
        records
            .iter()
            .partition(|r| study_sample_ids.contains(r.sample_id.as_str()));

    let mut top10 = BTreeMap::new();
    let mut outliers = BTreeMap::new();
    if study_records.is_empty() {
        log::debug!("no {} records for study subset", tool.as_str());
        return Ok((top10, outliers));
    }

    for rank in Rank::all() {
        let study_rank: Vec<&AbundanceRecord> = study_records
            .iter()
            .copied()
            .filter(|r| r.rank == Some(rank))
            .collect();
        if study_rank.is_empty() {
            top10.insert(rank, Vec::new());
            outliers.insert(rank, Vec::new());
            continue;
        }
        let compendium_rank: Vec<&AbundanceRecord> = compendium_records
            .iter()
            .copied()
            .filter(|r| r.rank == Some(rank))
            .collect();

        top10.insert(rank, top_by_mean_abundance(&study_rank, config.top_k));
        outliers.insert(
            rank,
            detect_outliers(&study_rank, &compendium_rank, config.alpha),
        );
    }
    Ok((top10, outliers))
}

fn summarize_ecosystem(study_samples: &[&Sample]) -> EcosystemSummary {
    let mut summary = EcosystemSummary::default();
    for label in ECOSYSTEM_LABELS {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for sample in study_samples {
            if let Some(value) = sample.ecosystem.get(label) {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            continue;
        }

        let most_common = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(value, _)| value.clone());
        summary
            .values
            .insert(label.to_string(), counts.keys().cloned().collect());
        if let Some(value) = most_common {
            summary.most_common.insert(label.to_string(), value);
        }
        summary.sample_counts.insert(label.to_string(), counts);
    }
    summary
}

fn collect_map_data(study_samples: &[&Sample]) -> MapData {
    let locations = study_samples
        .iter()
        .filter_map(|sample| {
            let latitude = sample.latitude?;
            let longitude = sample.longitude?;
            Some(SampleLocation {
                sample_id: sample.sample_id.clone(),
                latitude,
                longitude,
                ecosystem: sample.ecosystem.get("ecosystem").cloned(),
            })
        })
        .collect();
    MapData { locations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::MemorySource;
    use approx::assert_relative_eq;

    fn test_config() -> EngineConfig {
        EngineConfig {
            physical_variables: vec!["ph".to_string()],
            ..EngineConfig::default()
        }
    }

    fn ph_fixture() -> (MemorySource, SampleTable) {
        // Study st1 has ph [6.0, 6.5, 7.0]; st2 and st3 have per-study means
        // 7.0 and 8.0.
        let samples_tsv = "id\tstudy_id\tph\tecosystem\n\
             s1\tst1\t6.0\tSoil\n\
             s2\tst1\t6.5\tSoil\n\
             s3\tst1\t7.0\tWater\n\
             c1\tst2\t6.8\tWater\n\
             c2\tst2\t7.2\tWater\n\
             c3\tst3\t8.0\tWater\n";
        let source = MemorySource::new().with_table(TableKind::Samples, samples_tsv);
        let table = source.load(TableKind::Samples).unwrap();
        let samples = SampleTable::from_table(&table, &["ph".to_string()]).unwrap();
        (source, samples)
    }

    #[test]
    fn test_physical_study_means_baseline() {
        let (source, samples) = ph_fixture();
        let config = test_config();
        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();

        assert_eq!(analysis.sample_count, 3);
        let slot = analysis.physical.get("ph").unwrap();
        let comparison = slot.as_ok().unwrap();
        assert_relative_eq!(comparison.study.mean, 6.5, epsilon = 1e-12);
        assert_relative_eq!(comparison.study.std, 0.5, epsilon = 1e-12);
        assert_relative_eq!(comparison.compendium_mean, 7.5, epsilon = 1e-12);
        assert_relative_eq!(
            comparison.compendium_std,
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-12
        );
        assert_eq!(comparison.compendium_study_count, 2);
        assert!(comparison.effect_size < 0.0, "study tends lower");
        assert!((0.0..=1.0).contains(&comparison.p_value));
    }

    #[test]
    fn test_physical_pooled_baseline() {
        let (source, samples) = ph_fixture();
        let mut config = test_config();
        config.baseline = CompendiumBaseline::Pooled;
        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();

        let comparison = analysis.physical.get("ph").unwrap().as_ok().unwrap();
        // Pooled values [6.8, 7.2, 8.0]: mean differs from the study-means
        // baseline, the test itself is unchanged.
        assert_relative_eq!(
            comparison.compendium_mean,
            (6.8 + 7.2 + 8.0) / 3.0,
            epsilon = 1e-12
        );
        assert_eq!(comparison.compendium_study_count, 2);
    }

    #[test]
    fn test_empty_study_is_fatal() {
        let (source, samples) = ph_fixture();
        let config = test_config();
        let err = compute_study_analysis(&source, &samples, "missing", &config).unwrap_err();
        assert!(matches!(err, CompendiumError::StudyNotFound(_)));
    }

    #[test]
    fn test_variable_without_data_skipped() {
        let (source, samples) = ph_fixture();
        let mut config = test_config();
        config.physical_variables.push("depth".to_string());
        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();
        assert!(analysis.physical.contains_key("ph"));
        assert!(!analysis.physical.contains_key("depth"));
    }

    #[test]
    fn test_omics_top10_and_outliers() {
        let samples_tsv = "id\tstudy_id\tph\n\
             s1\tst1\t6.0\n\
             s2\tst1\t6.5\n\
             s3\tst1\t7.0\n\
             c1\tst2\t7.0\n\
             c2\tst2\t7.5\n\
             c3\tst3\t8.0\n";
        // Glucose is much higher in st1; Lactate is flat everywhere.
        let metabolomics_tsv = "sample_id\tcompound_name\tpeak_area\tmolecular_formula\n\
             s1\tGlucose\t100.0\tC6H12O6\n\
             s2\tGlucose\t110.0\tC6H12O6\n\
             s3\tGlucose\t120.0\tC6H12O6\n\
             s1\tLactate\t5.0\tC3H6O3\n\
             s2\tLactate\t6.0\tC3H6O3\n\
             s3\tLactate\t5.5\tC3H6O3\n\
             c1\tGlucose\t1.0\tC6H12O6\n\
             c2\tGlucose\t2.0\tC6H12O6\n\
             c3\tGlucose\t3.0\tC6H12O6\n\
             c1\tLactate\t5.2\tC3H6O3\n\
             c2\tLactate\t5.8\tC3H6O3\n\
             c3\tLactate\t5.4\tC3H6O3\n";
        let source = MemorySource::new()
            .with_table(TableKind::Samples, samples_tsv)
            .with_table(TableKind::Omics(OmicsCategory::Metabolomics), metabolomics_tsv);
        let table = source.load(TableKind::Samples).unwrap();
        let samples = SampleTable::from_table(&table, &["ph".to_string()]).unwrap();
        let config = test_config();

        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();
        let top10 = analysis
            .omics
            .top10
            .get(&OmicsCategory::Metabolomics)
            .unwrap();
        assert_eq!(top10.len(), 2);
        assert_eq!(top10[0].id, "Glucose");
        assert_relative_eq!(top10[0].mean_abundance, 110.0, epsilon = 1e-12);
        assert_eq!(top10[0].sample_count, 3);

        // Glucose separates completely; with n = 3 vs 3 the normal
        // approximation cannot reach p < 0.05, so assert the list is sorted
        // and contains only significant entries rather than a fixed count.
        let outliers = analysis
            .omics
            .outliers
            .get(&OmicsCategory::Metabolomics)
            .unwrap();
        for outlier in outliers {
            assert!(outlier.p_value < config.alpha);
        }

        // Other categories exist with empty lists.
        assert!(analysis
            .omics
            .top10
            .get(&OmicsCategory::Proteomics)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_taxonomic_per_rank() {
        let samples_tsv = "id\tstudy_id\n\
             s1\tst1\n\
             s2\tst1\n\
             c1\tst2\n\
             c2\tst2\n";
        let kraken_tsv = "sample_id\tname\trank\tabundance\n\
             s1\tFirmicutes\tphylum\t0.6\n\
             s2\tFirmicutes\tphylum\t0.7\n\
             s1\tBacillus\tgenus\t0.3\n\
             c1\tFirmicutes\tphylum\t0.2\n\
             c2\tProteobacteria\tphylum\t0.8\n";
        let source = MemorySource::new()
            .with_table(TableKind::Samples, samples_tsv)
            .with_table(TableKind::Taxonomic(TaxonomicTool::Kraken), kraken_tsv);
        let table = source.load(TableKind::Samples).unwrap();
        let samples = SampleTable::from_table(&table, &[]).unwrap();
        let config = test_config();

        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();
        let kraken = analysis.taxonomic.top10.get(&TaxonomicTool::Kraken).unwrap();
        let phyla = kraken.get(&Rank::Phylum).unwrap();
        assert_eq!(phyla.len(), 1);
        assert_eq!(phyla[0].id, "Firmicutes");
        assert_relative_eq!(phyla[0].mean_abundance, 0.65, epsilon = 1e-12);

        let genera = kraken.get(&Rank::Genus).unwrap();
        assert_eq!(genera.len(), 1);
        assert_eq!(genera[0].id, "Bacillus");

        // Tool without any study records yields an empty rank map.
        assert!(analysis
            .taxonomic
            .top10
            .get(&TaxonomicTool::Gottcha)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ecosystem_and_map() {
        let samples_tsv = "id\tstudy_id\tecosystem\tlatitude\tlongitude\n\
             s1\tst1\tSoil\t45.0\t-120.0\n\
             s2\tst1\tSoil\t\t\n\
             s3\tst1\tWater\t46.5\t-121.5\n\
             c1\tst2\tWater\t10.0\t10.0\n";
        let source = MemorySource::new().with_table(TableKind::Samples, samples_tsv);
        let table = source.load(TableKind::Samples).unwrap();
        let samples = SampleTable::from_table(&table, &[]).unwrap();
        let config = test_config();

        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();
        assert_eq!(
            analysis.ecosystem.most_common.get("ecosystem").map(String::as_str),
            Some("Soil")
        );
        assert_eq!(
            analysis.ecosystem.values.get("ecosystem").unwrap(),
            &vec!["Soil".to_string(), "Water".to_string()]
        );
        assert_eq!(
            analysis
                .ecosystem
                .sample_counts
                .get("ecosystem")
                .and_then(|c| c.get("Soil")),
            Some(&2)
        );

        // Only samples with both coordinates appear on the map.
        assert_eq!(analysis.map_data.locations.len(), 2);
        assert_eq!(analysis.map_data.locations[0].sample_id, "s1");
    }

    #[test]
    fn test_serialization_round_trip() {
        let (source, samples) = ph_fixture();
        let config = test_config();
        let analysis = compute_study_analysis(&source, &samples, "st1", &config).unwrap();

        let json = serde_json::to_string(&analysis).unwrap();
        let back: StudyAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(analysis, back);
    }
}
