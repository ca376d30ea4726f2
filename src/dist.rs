//! Discrete distributions used by the analytic power computation.
//!
//! The hypergeometric law is tabulated in log space over its support so a
//! single table answers `pmf`, `cdf`, `ppf` and `sf` queries without
//! cancellation in the upper tail.  Binomial probabilities come from
//! `statrs`; its quantile is found by bisection on the CDF.

use crate::error::{AuditError, Result};
use statrs::distribution::{Binomial, Discrete, DiscreteCDF};
use statrs::function::factorial::ln_binomial;

/// Hypergeometric law: `draws` items taken without replacement from
/// `population` items of which `successes` are marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hypergeometric {
    population: u64,
    successes: u64,
    draws: u64,
}

impl Hypergeometric {
    /// Validated parameters.
    pub fn new(population: u64, successes: u64, draws: u64) -> Result<Self> {
        if successes > population || draws > population {
            return Err(AuditError::Distribution(format!(
                "hypergeometric parameters out of range: N={population}, K={successes}, n={draws}"
            )));
        }
        Ok(Self {
            population,
            successes,
            draws,
        })
    }

    /// Smallest value with non-zero mass.
    pub fn min_value(&self) -> u64 {
        (self.draws + self.successes).saturating_sub(self.population)
    }

    /// Largest value with non-zero mass.
    pub fn max_value(&self) -> u64 {
        self.successes.min(self.draws)
    }

    /// `ln P(X = x)`; negative infinity outside the support.
    pub fn ln_pmf(&self, x: u64) -> f64 {
        if x < self.min_value() || x > self.max_value() {
            return f64::NEG_INFINITY;
        }
        ln_binomial(self.successes, x)
            + ln_binomial(self.population - self.successes, self.draws - x)
            - ln_binomial(self.population, self.draws)
    }

    /// `P(X = x)`.
    pub fn pmf(&self, x: u64) -> f64 {
        self.ln_pmf(x).exp()
    }

    /// Tabulates the probability mass over the whole support.
    pub fn table(&self) -> PmfTable {
        let start = self.min_value();
        let probs = (start..=self.max_value()).map(|x| self.pmf(x)).collect();
        PmfTable { start, probs }
    }
}

/// Probability mass over a contiguous support `start..start + len`.
#[derive(Debug, Clone, PartialEq)]
pub struct PmfTable {
    start: u64,
    probs: Vec<f64>,
}

impl PmfTable {
    /// `P(X <= x)`.
    pub fn cdf(&self, x: u64) -> f64 {
        if x < self.start {
            return 0.0;
        }
        let upto = ((x - self.start) as usize).min(self.probs.len().saturating_sub(1));
        self.probs[..=upto].iter().sum::<f64>().min(1.0)
    }

    /// `P(X > x)`, summed from the upper tail.
    pub fn sf(&self, x: u64) -> f64 {
        if x < self.start {
            return 1.0;
        }
        let from = (x - self.start) as usize + 1;
        self.probs
            .get(from..)
            .map(|tail| tail.iter().sum::<f64>())
            .unwrap_or(0.0)
            .min(1.0)
    }

    /// Smallest `x` with `P(X <= x) >= q`.
    pub fn ppf(&self, q: f64) -> u64 {
        let mut acc = 0.0;
        for (offset, &mass) in self.probs.iter().enumerate() {
            acc += mass;
            if acc >= q {
                return self.start + offset as u64;
            }
        }
        self.start + self.probs.len().saturating_sub(1) as u64
    }
}

/// Binomial(`trials`, `p`) as a `statrs` distribution.
pub fn binomial(trials: u64, p: f64) -> Result<Binomial> {
    Binomial::new(p, trials).map_err(|err| AuditError::Distribution(err.to_string()))
}

/// `P(X = k)` for `X ~ Binomial(trials, p)`.
pub fn binomial_pmf(law: &Binomial, k: u64) -> f64 {
    law.pmf(k)
}

/// Smallest `k` in `0..=trials` with `P(X <= k) >= q`.
pub fn binomial_ppf(law: &Binomial, trials: u64, q: f64) -> u64 {
    if q <= 0.0 {
        return 0;
    }
    let (mut lo, mut hi) = (0u64, trials);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if law.cdf(mid) >= q {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypergeometric_reference_values() {
        let law = Hypergeometric::new(10, 5, 3).unwrap();
        assert!((law.pmf(0) - 10.0 / 120.0).abs() < 1e-12);
        assert!((law.pmf(2) - 50.0 / 120.0).abs() < 1e-12);
        assert_eq!(law.pmf(4), 0.0);
        let table = law.table();
        assert!((table.cdf(3) - 1.0).abs() < 1e-12);
        assert!((table.sf(1) - 60.0 / 120.0).abs() < 1e-12);
        assert_eq!(table.ppf(0.4), 1);
        assert_eq!(table.ppf(0.6), 2);
    }

    #[test]
    fn support_respects_forced_successes() {
        // Drawing 9 of 10 with 5 marked forces at least 4 marked.
        let law = Hypergeometric::new(10, 5, 9).unwrap();
        assert_eq!(law.min_value(), 4);
        assert_eq!(law.max_value(), 5);
        let table = law.table();
        assert_eq!(table.cdf(3), 0.0);
        assert_eq!(table.sf(3), 1.0);
        assert_eq!(table.sf(5), 0.0);
    }

    #[test]
    fn hypergeometric_rejects_bad_parameters() {
        assert!(Hypergeometric::new(10, 11, 3).is_err());
        assert!(Hypergeometric::new(10, 3, 11).is_err());
    }

    #[test]
    fn mass_sums_to_one_at_scale() {
        let law = Hypergeometric::new(10_000, 5_000, 400).unwrap();
        let total: f64 = (0..=400).map(|x| law.pmf(x)).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((law.table().cdf(400) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn binomial_quantiles_bracket_the_mean() {
        let law = binomial(1_000, 0.3).unwrap();
        let lower = binomial_ppf(&law, 1_000, 0.005);
        let upper = binomial_ppf(&law, 1_000, 0.995);
        assert!(lower < 300 && 300 < upper);
        assert!(law.cdf(lower) >= 0.005);
        assert!(lower == 0 || law.cdf(lower - 1) < 0.005);
        assert!(binomial_pmf(&law, 300) > binomial_pmf(&law, 250));
    }

    #[test]
    fn degenerate_binomials() {
        let none = binomial(50, 0.0).unwrap();
        assert_eq!(binomial_ppf(&none, 50, 0.995), 0);
        let all = binomial(50, 1.0).unwrap();
        assert_eq!(binomial_ppf(&all, 50, 0.005), 50);
    }
}
