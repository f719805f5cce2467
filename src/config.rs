//! Engine configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the descriptive compendium baseline for physical variables is formed.
///
/// The original system averaged per-study means so large studies do not
/// dominate the baseline, while still running the significance test on raw
/// pooled values. Both behaviors are kept selectable; the test always uses
/// pooled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompendiumBaseline {
    /// Mean and std of per-study means (default).
    StudyMeans,
    /// Mean and std of raw pooled compendium values.
    Pooled,
}

/// Configuration for the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for durable cache entries.
    pub cache_dir: PathBuf,
    /// Physical variables compared per study.
    pub physical_variables: Vec<String>,
    /// Significance threshold for rank-sum tests.
    pub alpha: f64,
    /// Entities retained per ranked list.
    pub top_k: usize,
    /// Descriptive compendium baseline mode.
    pub baseline: CompendiumBaseline,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("analysis_cache"),
            physical_variables: default_physical_variables(),
            alpha: 0.05,
            top_k: 10,
            baseline: CompendiumBaseline::StudyMeans,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at the given cache directory.
    pub fn new<P: Into<PathBuf>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Load from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Save to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Physical variables compared by default.
fn default_physical_variables() -> Vec<String> {
    [
        "ph",
        "temperature",
        "depth",
        "latitude",
        "longitude",
        "salinity",
        "conductivity",
        "dissolved_oxygen",
        "chlorophyll",
        "total_carbon",
        "total_organic_carbon",
        "total_nitrogen",
        "total_phosphorus",
        "ammonium_nitrogen",
        "nitrate_nitrogen",
        "nitrite_nitrogen",
        "carbon_nitrogen_ratio",
        "calcium",
        "magnesium",
        "manganese",
        "potassium",
        "sodium",
        "sulfate",
        "zinc",
        "humidity",
        "water_content",
    ]
    .iter()
    .map(|v| v.to_string())
    .collect()
}
