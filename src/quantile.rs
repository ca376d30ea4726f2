//! Percentiles of trial outcomes.
//!
//! Uses the linear-interpolation definition (Hyndman & Fan type 7), the
//! convention of most statistics packages:
//!
//! ```text
//! h = (n - 1) * q
//! Q = x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])
//! ```
//!
//! Only five quantiles are ever reported, so order statistics are found with
//! `select_nth_unstable` instead of sorting the whole multiset.

use serde::Serialize;

/// Quantiles reported by every estimator, in percent.
pub const QUANTILES: [u8; 5] = [25, 50, 75, 90, 99];

/// Computes the `q`-th percentile (`q` in `[0, 100]`) of `data`.
///
/// The slice is partially reordered.  Returns `None` when `data` is empty.
pub fn percentile(data: &mut [u64], q: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let n = data.len();
    let h = (n - 1) as f64 * (q / 100.0).clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    let (_, &mut lo_val, upper) = data.select_nth_unstable(lo);
    if frac == 0.0 || upper.is_empty() {
        return Some(lo_val as f64);
    }
    // Everything right of the pivot is >= it, so the next order statistic is
    // the minimum of that partition.
    let hi_val = upper.iter().copied().min().unwrap_or(lo_val);
    Some(lo_val as f64 + frac * (hi_val as f64 - lo_val as f64))
}

/// Value of each reported quantile, normalised by the caller's scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileSummary {
    values: [f64; 5],
}

impl PercentileSummary {
    /// Wraps values listed in [`QUANTILES`] order.
    pub fn new(values: [f64; 5]) -> Self {
        Self { values }
    }

    /// Percentiles of `data` divided by `scale`; all zeros if `data` is empty.
    pub fn from_samples(data: &mut [u64], scale: f64) -> Self {
        let mut values = [0.0; 5];
        for (slot, &q) in values.iter_mut().zip(QUANTILES.iter()) {
            *slot = percentile(data, f64::from(q)).unwrap_or(0.0) / scale;
        }
        Self { values }
    }

    /// Value for quantile `q` (one of [`QUANTILES`]).
    pub fn get(&self, q: u8) -> Option<f64> {
        QUANTILES
            .iter()
            .position(|&candidate| candidate == q)
            .map(|idx| self.values[idx])
    }

    /// Values in [`QUANTILES`] order.
    pub fn values(&self) -> &[f64; 5] {
        &self.values
    }

    /// `(quantile, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        QUANTILES.iter().copied().zip(self.values.iter().copied())
    }

    /// Whether the values never decrease with the quantile.
    pub fn is_monotone(&self) -> bool {
        self.values.windows(2).all(|pair| pair[0] <= pair[1])
    }
}
