//! Sample records and per-study indexing.

use crate::data::table::Table;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ecosystem label columns carried through from the samples table.
pub const ECOSYSTEM_LABELS: [&str; 5] = [
    "ecosystem",
    "ecosystem_category",
    "ecosystem_type",
    "ecosystem_subtype",
    "specific_ecosystem",
];

/// One source sample: identity, physical measurements, and labels.
///
/// Immutable once parsed; only configured physical variables with non-null
/// values are retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    pub study_id: String,
    pub name: Option<String>,
    pub collection_date: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Ecosystem label column -> value, for columns present with a value.
    pub ecosystem: BTreeMap<String, String>,
    /// Physical variable -> value, non-null finite values only.
    pub physical: BTreeMap<String, f64>,
}

/// All samples, indexed by id and by owning study.
#[derive(Debug, Clone)]
pub struct SampleTable {
    samples: Vec<Sample>,
    by_id: HashMap<String, usize>,
    by_study: HashMap<String, Vec<usize>>,
}

impl SampleTable {
    /// Parse the samples table, keeping the given physical variables.
    ///
    /// Rows without an `id` or `study_id` are dropped. Physical variables
    /// whose column is absent are simply not present on any sample.
    pub fn from_table(table: &Table, physical_variables: &[String]) -> Result<Self> {
        table.require_column("id")?;
        table.require_column("study_id")?;

        let mut samples = Vec::new();
        let mut by_id = HashMap::new();
        let mut by_study: HashMap<String, Vec<usize>> = HashMap::new();

        for row in 0..table.n_rows() {
            let Some(sample_id) = table.text(row, "id") else {
                continue;
            };
            let Some(study_id) = table.text(row, "study_id") else {
                continue;
            };

            let mut physical = BTreeMap::new();
            for variable in physical_variables {
                if let Some(value) = table.numeric(row, variable) {
                    if value.is_finite() {
                        physical.insert(variable.clone(), value);
                    }
                }
            }

            let mut ecosystem = BTreeMap::new();
            for label in ECOSYSTEM_LABELS {
                if let Some(value) = table.text(row, label) {
                    ecosystem.insert(label.to_string(), value.to_string());
                }
            }

            let sample = Sample {
                sample_id: sample_id.to_string(),
                study_id: study_id.to_string(),
                name: table.text(row, "sample_name").map(str::to_string),
                collection_date: table.text(row, "collection_date").map(str::to_string),
                latitude: table.numeric(row, "latitude").filter(|v| v.is_finite()),
                longitude: table.numeric(row, "longitude").filter(|v| v.is_finite()),
                ecosystem,
                physical,
            };

            let idx = samples.len();
            by_id.insert(sample.sample_id.clone(), idx);
            by_study.entry(sample.study_id.clone()).or_default().push(idx);
            samples.push(sample);
        }

        Ok(Self {
            samples,
            by_id,
            by_study,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Look up one sample by id.
    pub fn get(&self, sample_id: &str) -> Option<&Sample> {
        self.by_id.get(sample_id).map(|&idx| &self.samples[idx])
    }

    /// All samples belonging to a study.
    pub fn study_samples(&self, study_id: &str) -> Vec<&Sample> {
        self.by_study
            .get(study_id)
            .map(|indices| indices.iter().map(|&idx| &self.samples[idx]).collect())
            .unwrap_or_default()
    }

    /// All samples NOT belonging to a study (the compendium subset).
    pub fn compendium_samples(&self, study_id: &str) -> Vec<&Sample> {
        self.samples
            .iter()
            .filter(|s| s.study_id != study_id)
            .collect()
    }

    /// Iterate over all samples.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
