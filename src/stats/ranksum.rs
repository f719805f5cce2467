//! Two-sided Mann-Whitney U rank-sum test.
//!
//! Uses the normal approximation with mid-rank tie correction and a
//! continuity correction, the standard large-sample treatment. When either
//! side is empty, or every value is tied (zero rank variance), the test is
//! skipped: p = 1.0, not significant.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Result of a rank-sum test between two independent samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSumTest {
    /// U statistic for the first sample.
    pub u: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Whether p fell below the significance threshold.
    pub significant: bool,
}

impl RankSumTest {
    fn skipped() -> Self {
        Self {
            u: 0.0,
            p_value: 1.0,
            significant: false,
        }
    }
}

/// Run a two-sided Mann-Whitney U test of `a` against `b`.
///
/// Non-finite values are dropped before ranking. `alpha` is the significance
/// threshold applied to the two-sided p-value.
pub fn mann_whitney_u(a: &[f64], b: &[f64], alpha: f64) -> RankSumTest {
    let a: Vec<f64> = a.iter().copied().filter(|v| v.is_finite()).collect();
    let b: Vec<f64> = b.iter().copied().filter(|v| v.is_finite()).collect();
    let n1 = a.len();
    let n2 = b.len();
    if n1 == 0 || n2 == 0 {
        return RankSumTest::skipped();
    }
    let n = n1 + n2;

    // Combined sort; true marks membership in `a`.
    let mut combined: Vec<(f64, bool)> = a
        .iter()
        .map(|&v| (v, true))
        .chain(b.iter().map(|&v| (v, false)))
        .collect();
    combined.sort_by(|x, y| x.0.total_cmp(&y.0));

    // Mid-ranks for ties, accumulating the tie-correction term Σ(t³ − t).
    let mut rank_sum_a = 0.0f64;
    let mut tie_term = 0.0f64;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && combined[j].0 == combined[i].0 {
            j += 1;
        }
        let t = (j - i) as f64;
        // Ranks are 1-based; tied values share the mean of their ranks.
        let mid_rank = (i + 1 + j) as f64 / 2.0;
        for item in &combined[i..j] {
            if item.1 {
                rank_sum_a += mid_rank;
            }
        }
        if t > 1.0 {
            tie_term += t * t * t - t;
        }
        i = j;
    }

    let n1f = n1 as f64;
    let n2f = n2 as f64;
    let nf = n as f64;
    let u1 = rank_sum_a - n1f * (n1f + 1.0) / 2.0;
    let mean_u = n1f * n2f / 2.0;
    let var_u = n1f * n2f / 12.0 * ((nf + 1.0) - tie_term / (nf * (nf - 1.0)));
    if var_u <= 0.0 {
        // Every observation tied across both samples.
        return RankSumTest {
            u: u1,
            ..RankSumTest::skipped()
        };
    }

    let diff = u1 - mean_u;
    let continuity = if diff > 0.0 {
        0.5
    } else if diff < 0.0 {
        -0.5
    } else {
        0.0
    };
    let z = (diff - continuity) / var_u.sqrt();
    let normal = Normal::new(0.0, 1.0).unwrap();
    let p_value = (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0);

    RankSumTest {
        u: u1,
        p_value,
        significant: p_value < alpha,
    }
}
