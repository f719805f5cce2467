//! Statistical primitives: descriptive statistics, rank-sum significance
//! testing, and distribution-free effect size.

pub mod describe;
pub mod effect;
pub mod ranksum;

pub use describe::{describe, sample_mean_std, DescriptiveStats, Histogram, HISTOGRAM_BINS};
pub use effect::cliffs_delta;
pub use ranksum::{mann_whitney_u, RankSumTest};
