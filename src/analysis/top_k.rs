//! Top-K ranking of entities by mean abundance within a sample subset.

use crate::data::{AbundanceRecord, EntityMetadata};
use crate::stats::sample_mean_std;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of entities retained per ranked list.
pub const TOP_K: usize = 10;

/// One entry of a top-K list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: String,
    pub mean_abundance: f64,
    pub std_abundance: f64,
    pub sample_count: usize,
    /// First-seen metadata for the entity.
    pub metadata: EntityMetadata,
}

/// Rank a record subset by mean abundance, descending, returning at most `k`.
///
/// Records are grouped by entity id; each group reports mean, sample standard
/// deviation, and record count. Ties in mean abundance break ascending by
/// entity id so repeated runs over identical data are reproducible.
pub fn top_by_mean_abundance(records: &[&AbundanceRecord], k: usize) -> Vec<RankedEntity> {
    struct Group<'a> {
        values: Vec<f64>,
        metadata: &'a EntityMetadata,
    }

    let mut groups: HashMap<&str, Group> = HashMap::new();
    for record in records {
        groups
            .entry(record.entity_id.as_str())
            .or_insert_with(|| Group {
                values: Vec::new(),
                metadata: &record.metadata,
            })
            .values
            .push(record.abundance);
    }

    let mut ranked: Vec<RankedEntity> = groups
        .into_iter()
        .map(|(id, group)| {
            let (mean, std) = sample_mean_std(&group.values);
            RankedEntity {
                id: id.to_string(),
                mean_abundance: mean,
                std_abundance: std,
                sample_count: group.values.len(),
                metadata: group.metadata.clone(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.mean_abundance
            .total_cmp(&a.mean_abundance)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(k);
    ranked
}
