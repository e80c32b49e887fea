//! Summary statistics and nearest-rank percentiles
//!
//! All functions accept empty input and return `None` fields instead of
//! panicking or producing NaN.

use serde::{Deserialize, Serialize};

/// Percentiles reported for the latency distribution
pub const REPORTED_PERCENTILES: [u32; 11] = [0, 1, 10, 25, 50, 75, 90, 95, 98, 99, 100];

/// Mean, sample standard deviation and range of a set of values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Summarize `values`; every field is `None` for empty input
pub fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }
    let mean = mean(values);
    Summary {
        mean: Some(mean),
        std_dev: Some(sample_std_dev(values, mean)),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation; 0 for fewer than two values
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// 0-based nearest-rank index `ceil(p * n / 100) - 1`, clamped to the list.
///
/// `None` for an empty list.
pub fn nearest_rank_index(percentile: u32, n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let p = percentile.min(100) as usize;
    let rank = (p * n).div_ceil(100);
    Some(rank.saturating_sub(1).min(n - 1))
}

/// Nearest-rank percentile of an ascending-sorted slice
pub fn percentile<T: Copy>(sorted: &[T], percentile: u32) -> Option<T> {
    nearest_rank_index(percentile, sorted.len()).map(|i| sorted[i])
}

/// Latency percentiles in milliseconds, serialized as `l0` .. `l100`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub l0: Option<u64>,
    pub l1: Option<u64>,
    pub l10: Option<u64>,
    pub l25: Option<u64>,
    pub l50: Option<u64>,
    pub l75: Option<u64>,
    pub l90: Option<u64>,
    pub l95: Option<u64>,
    pub l98: Option<u64>,
    pub l99: Option<u64>,
    pub l100: Option<u64>,
}

impl LatencyPercentiles {
    /// Percentiles of an ascending-sorted latency list
    pub fn from_sorted(sorted: &[u64]) -> Self {
        Self {
            l0: percentile(sorted, 0),
            l1: percentile(sorted, 1),
            l10: percentile(sorted, 10),
            l25: percentile(sorted, 25),
            l50: percentile(sorted, 50),
            l75: percentile(sorted, 75),
            l90: percentile(sorted, 90),
            l95: percentile(sorted, 95),
            l98: percentile(sorted, 98),
            l99: percentile(sorted, 99),
            l100: percentile(sorted, 100),
        }
    }

    /// `(percentile, value)` pairs in reporting order
    pub fn entries(&self) -> [(u32, Option<u64>); 11] {
        [
            (0, self.l0),
            (1, self.l1),
            (10, self.l10),
            (25, self.l25),
            (50, self.l50),
            (75, self.l75),
            (90, self.l90),
            (95, self.l95),
            (98, self.l98),
            (99, self.l99),
            (100, self.l100),
        ]
    }
}
