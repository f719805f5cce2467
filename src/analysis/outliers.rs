//! Outlier detection: entities whose study abundance distribution differs
//! significantly from the compendium.
//!
//! Both record sets are grouped by entity id once up front; per-entity tests
//! then run in parallel, since each entity's statistics are independent.

use crate::analysis::{Direction, EntityComparison};
use crate::data::{AbundanceRecord, EntityMetadata};
use crate::stats::{cliffs_delta, mann_whitney_u, sample_mean_std};
use rayon::prelude::*;
use std::collections::HashMap;

/// Screen every entity present in the study against the compendium.
///
/// The two record sets must come from disjoint sample subsets. Entities with
/// no compendium observations are skipped; retained entries are significant
/// at `alpha` and sorted descending by |effect size| with ascending entity id
/// as the tie-break.
pub fn detect_outliers(
    study: &[&AbundanceRecord],
    compendium: &[&AbundanceRecord],
    alpha: f64,
) -> Vec<EntityComparison> {
    struct StudyGroup<'a> {
        values: Vec<f64>,
        metadata: &'a EntityMetadata,
    }

    let mut study_groups: HashMap<&str, StudyGroup> = HashMap::new();
    for record in study {
        study_groups
            .entry(record.entity_id.as_str())
            .or_insert_with(|| StudyGroup {
                values: Vec::new(),
                metadata: &record.metadata,
            })
            .values
            .push(record.abundance);
    }

    let mut compendium_groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in compendium {
        compendium_groups
            .entry(record.entity_id.as_str())
            .or_default()
            .push(record.abundance);
    }

    // Fix iteration order before going parallel so output is deterministic.
    let mut entities: Vec<(&str, StudyGroup)> = study_groups.into_iter().collect();
    entities.sort_by(|a, b| a.0.cmp(b.0));

    let mut significant: Vec<EntityComparison> = entities
        .par_iter()
        .filter_map(|(id, group)| {
            let compendium_values = compendium_groups.get(id)?;
            if compendium_values.is_empty() {
                return None;
            }

            let test = mann_whitney_u(&group.values, compendium_values, alpha);
            if !test.significant {
                return None;
            }
            let delta = cliffs_delta(&group.values, compendium_values);

            let (mean, std) = sample_mean_std(&group.values);
            let (compendium_mean, compendium_std) = sample_mean_std(compendium_values);
            Some(EntityComparison {
                id: id.to_string(),
                mean_abundance: mean,
                std_abundance: std,
                sample_count: group.values.len(),
                compendium_mean,
                compendium_std,
                compendium_count: compendium_values.len(),
                p_value: test.p_value,
                effect_size: delta,
                direction: Direction::from_delta(delta),
                metadata: group.metadata.clone(),
            })
        })
        .collect();

    significant.sort_by(|a, b| {
        b.effect_size
            .abs()
            .total_cmp(&a.effect_size.abs())
            .then_with(|| a.id.cmp(&b.id))
    });
    significant
}
