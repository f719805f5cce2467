//! Sample analysis orchestration.
//!
//! Re-projects a study's cached analysis onto one sample: every physical
//! variable and top-10 entity the study tracks is paired with the sample's
//! own observed value and a z-score against the study statistics.

use crate::analysis::study::StudyAnalysis;
use crate::data::{
    AbundanceRecord, OmicsCategory, Rank, Sample, TableKind, TableSource, TaxonomicTool,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One physical variable observed on a sample, scored against the study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleVariable {
    pub value: f64,
    pub z_score: f64,
    pub study_mean: f64,
    pub study_std: f64,
}

/// One study top-10 entity with the sample's own abundance attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntity {
    pub id: String,
    /// The sample's raw abundance; 0.0 when the entity was not observed.
    pub abundance: f64,
    pub study_mean: f64,
    pub study_std: f64,
    /// Number of study samples behind the study statistics.
    pub sample_count: usize,
    pub z_score: f64,
}

/// The cached analysis unit for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAnalysis {
    pub sample_id: String,
    pub study_id: String,
    pub name: Option<String>,
    pub collection_date: Option<String>,
    pub ecosystem: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub physical: BTreeMap<String, SampleVariable>,
    pub omics: BTreeMap<OmicsCategory, Vec<SampleEntity>>,
    pub taxonomic: BTreeMap<TaxonomicTool, BTreeMap<Rank, Vec<SampleEntity>>>,
}

/// Z-score of a value against a mean/std pair; 0.0 when std is 0.
fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        0.0
    } else {
        (value - mean) / std
    }
}

/// Project a study's cached analysis onto one of its samples.
///
/// The study analysis must belong to the sample's own study. Omics and
/// taxonomic tables are re-read to pick up the sample's raw abundances; a
/// category that fails to load is recorded as an empty list, mirroring the
/// study orchestrator.
pub fn compute_sample_analysis(
    source: &dyn TableSource,
    sample: &Sample,
    study: &StudyAnalysis,
) -> Result<SampleAnalysis> {
    log::info!(
        "analyzing sample {} against study {}",
        sample.sample_id,
        study.study_id
    );

    let mut physical = BTreeMap::new();
    for (variable, slot) in &study.physical {
        let Some(comparison) = slot.as_ok() else {
            continue;
        };
        let Some(&value) = sample.physical.get(variable) else {
            continue;
        };
        physical.insert(
            variable.clone(),
            SampleVariable {
                value,
                z_score: z_score(value, comparison.study.mean, comparison.study.std),
                study_mean: comparison.study.mean,
                study_std: comparison.study.std,
            },
        );
    }

    let mut omics = BTreeMap::new();
    for (&category, top10) in &study.omics.top10 {
        let entities = match sample_omics_entities(source, sample, category, top10) {
            Ok(entities) => entities,
            Err(e) => {
                log::error!(
                    "error loading {} for sample {}: {e}",
                    category.as_str(),
                    sample.sample_id
                );
                Vec::new()
            }
        };
        omics.insert(category, entities);
    }

    let mut taxonomic = BTreeMap::new();
    for (&tool, by_rank) in &study.taxonomic.top10 {
        let ranks = match sample_taxonomic_entities(source, sample, tool, by_rank) {
            Ok(ranks) => ranks,
            Err(e) => {
                log::error!(
                    "error loading {} for sample {}: {e}",
                    tool.as_str(),
                    sample.sample_id
                );
                BTreeMap::new()
            }
        };
        taxonomic.insert(tool, ranks);
    }

    Ok(SampleAnalysis {
        sample_id: sample.sample_id.clone(),
        study_id: sample.study_id.clone(),
        name: sample.name.clone(),
        collection_date: sample.collection_date.clone(),
        ecosystem: sample.ecosystem.get("ecosystem").cloned(),
        latitude: sample.latitude,
        longitude: sample.longitude,
        physical,
        omics,
        taxonomic,
    })
}

fn project_entities(
    top10: &[crate::analysis::RankedEntity],
    own_abundance: &HashMap<&str, f64>,
) -> Vec<SampleEntity> {
    top10
        .iter()
        .map(|entity| {
            let abundance = own_abundance
                .get(entity.id.as_str())
                .copied()
                .unwrap_or(0.0);
            SampleEntity {
                id: entity.id.clone(),
                abundance,
                study_mean: entity.mean_abundance,
                study_std: entity.std_abundance,
                sample_count: entity.sample_count,
                z_score: z_score(abundance, entity.mean_abundance, entity.std_abundance),
            }
        })
        .collect()
}

fn sample_omics_entities(
    source: &dyn TableSource,
    sample: &Sample,
    category: OmicsCategory,
    top10: &[crate::analysis::RankedEntity],
) -> Result<Vec<SampleEntity>> {
    let table = source.load(TableKind::Omics(category))?;
    let records = AbundanceRecord::from_omics_table(&table, category);

    // First record wins for duplicated entities within the sample.
    let mut own: HashMap<&str, f64> = HashMap::new();
    for record in &records {
        if record.sample_id == sample.sample_id {
            own.entry(record.entity_id.as_str()).or_insert(record.abundance);
        }
    }
    Ok(project_entities(top10, &own))
}

fn sample_taxonomic_entities(
    source: &dyn TableSource,
    sample: &Sample,
    tool: TaxonomicTool,
    by_rank: &BTreeMap<Rank, Vec<crate::analysis::RankedEntity>>,
) -> Result<BTreeMap<Rank, Vec<SampleEntity>>> {
    let table = source.load(TableKind::Taxonomic(tool))?;
    let records = AbundanceRecord::from_taxonomic_table(&table, tool);

    let mut own: HashMap<(Rank, &str), f64> = HashMap::new();
    for record in &records {
        if record.sample_id != sample.sample_id {
            continue;
        }
        if let Some(rank) = record.rank {
            own.entry((rank, record.entity_id.as_str()))
                .or_insert(record.abundance);
        }
    }

    let mut result = BTreeMap::new();
    for (&rank, top10) in by_rank {
        let scoped: HashMap<&str, f64> = own
            .iter()
            .filter(|((r, _), _)| *r == rank)
            .map(|((_, id), &abundance)| (*id, abundance))
            .collect();
        result.insert(rank, project_entities(top10, &scoped));
    }
    Ok(result)
}
