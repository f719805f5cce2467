//! Study-vs-compendium analysis: ranking, outlier detection, and the
//! study/sample orchestrators.
//!
//! Every comparison in this module pits a study's sample subset against the
//! disjoint remainder of the collection (the compendium).

pub mod outliers;
pub mod sample;
pub mod study;
pub mod top_k;

pub use outliers::detect_outliers;
pub use sample::{compute_sample_analysis, SampleAnalysis, SampleEntity, SampleVariable};
pub use study::{
    compute_study_analysis, EcosystemSummary, MapData, OmicsBlock, SampleLocation,
    StudyAnalysis, TaxonomicBlock, VariableComparison, VariableSlot,
};
pub use top_k::{top_by_mean_abundance, RankedEntity, TOP_K};

use crate::data::EntityMetadata;
use serde::{Deserialize, Serialize};

/// Whether a study's values tend to sit above or below the compendium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    /// Classify a signed effect size; zero counts as lower.
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Higher
        } else {
            Self::Lower
        }
    }
}

/// Significance-tested comparison of one entity's abundance distribution
/// between a study and the compendium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityComparison {
    pub id: String,
    pub mean_abundance: f64,
    pub std_abundance: f64,
    pub sample_count: usize,
    pub compendium_mean: f64,
    pub compendium_std: f64,
    pub compendium_count: usize,
    pub p_value: f64,
    pub effect_size: f64,
    pub direction: Direction,
    pub metadata: EntityMetadata,
}
