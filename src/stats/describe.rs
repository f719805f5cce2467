//! Descriptive statistics over a filtered numeric subset.

use crate::error::{CompendiumError, Result};
use serde::{Deserialize, Serialize};

/// Number of histogram bins.
pub const HISTOGRAM_BINS: usize = 50;

/// A fixed-bin-count histogram spanning the observed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Per-bin counts, `HISTOGRAM_BINS` entries.
    pub counts: Vec<u64>,
    /// Bin edges, `HISTOGRAM_BINS + 1` entries.
    pub bin_edges: Vec<f64>,
}

/// Descriptive statistics for one variable over one row subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1); 0.0 for a single observation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub histogram: Histogram,
}

/// Mean and sample standard deviation (ddof = 1) of a finite slice.
///
/// A single observation has std 0.0 so that downstream z-scores stay finite.
pub fn sample_mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

/// Compute descriptive statistics, dropping non-finite values first.
///
/// An empty set after dropping signals `NoData`; callers skip the variable
/// rather than abort the containing orchestration.
pub fn describe(values: &[f64]) -> Result<DescriptiveStats> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(CompendiumError::NoData(
            "no finite values in subset".to_string(),
        ));
    }

    let (mean, std) = sample_mean_std(&finite);
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(DescriptiveStats {
        count: finite.len(),
        mean,
        std,
        min,
        max,
        histogram: histogram(&finite, min, max),
    })
}

/// Fixed-bin histogram over [min, max]; a degenerate range (min == max)
/// is widened by ±0.5 so every value lands in a bin.
fn histogram(values: &[f64], min: f64, max: f64) -> Histogram {
    let (lo, hi) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let span = hi - lo;
    let mut counts = vec![0u64; HISTOGRAM_BINS];
    for &v in values {
        let mut bin = ((v - lo) / span * HISTOGRAM_BINS as f64) as usize;
        if bin >= HISTOGRAM_BINS {
            bin = HISTOGRAM_BINS - 1;
        }
        counts[bin] += 1;
    }
    let bin_edges = (0..=HISTOGRAM_BINS)
        .map(|i| lo + span * i as f64 / HISTOGRAM_BINS as f64)
        .collect();
    Histogram { counts, bin_edges }
}
