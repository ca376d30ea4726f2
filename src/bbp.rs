//! Analytic power of a Bernoulli ballot-polling (BBP) audit.
//!
//! A BBP audit includes every ballot independently with probability `π`
//! and then runs a single fixed-size test on whatever was drawn.  Its
//! unconditional power mixes the hypergeometric power at each sample size
//! `n` with the binomial probability of drawing exactly `n` relevant ballots:
//!
//! ```text
//! power(π) = Σ_n  Binom(N_wl, π).pmf(n) · P_alt(X > q_α(n))
//! q_α(n)   = Hypergeom(N_wl, N_wl/2, n).ppf(1 - α)
//! ```
//!
//! The sum only runs over the central `1 - 2·tail_mass` of the binomial
//! mass and is divided by the mass it keeps, so the result is the power
//! conditional on `n` landing in that window.  Power stays non-decreasing
//! in `π` as the window moves.

use crate::dist::{binomial, binomial_pmf, binomial_ppf, Hypergeometric};
use crate::error::Result;
use crate::params::AuditParameters;
use crate::parallel;
use crate::quantile::{PercentileSummary, QUANTILES};
use tracing::{debug, info};

/// Binomial mass dropped from each tail of the sample-size sum.
pub const DEFAULT_TAIL_MASS: f64 = 0.005;

/// Power of the fixed-size test at sample size `n`, weighted by `P(n)`.
fn power_term(margin: f64, n_wl: u64, draws: u64, alpha: f64, weight: f64) -> Result<f64> {
    if weight == 0.0 {
        return Ok(0.0);
    }
    let p1 = 0.5 + margin / 2.0;
    let alt_successes = ((n_wl as f64) * p1).round().clamp(0.0, n_wl as f64) as u64;
    let null = Hypergeometric::new(n_wl, n_wl / 2, draws)?.table();
    let q_alpha = null.ppf(1.0 - alpha);
    let alt = Hypergeometric::new(n_wl, alt_successes, draws)?.table();
    Ok(weight * alt.sf(q_alpha))
}

/// Unconditional power of a BBP audit at sampling rate `pi`.
///
/// `margin` is `(Vw − Vl) / (Vw + Vl)` and `n_wl = Vw + Vl`.
pub fn unconditional_power(
    margin: f64,
    n_wl: u64,
    pi: f64,
    alpha: f64,
    tail_mass: f64,
) -> Result<f64> {
    let law = binomial(n_wl, pi)?;
    let lower = binomial_ppf(&law, n_wl, tail_mass);
    let upper = binomial_ppf(&law, n_wl, 1.0 - tail_mass);
    let terms = parallel::map_collect(lower..upper + 1, |draws| {
        power_term(margin, n_wl, draws, alpha, binomial_pmf(&law, draws))
    });
    let power = terms.into_iter().sum::<Result<f64>>()?;
    // Renormalise by the kept mass so moving the window never lowers power.
    let kept: f64 = (lower..=upper).map(|draws| binomial_pmf(&law, draws)).sum();
    if kept <= 0.0 {
        return Ok(0.0);
    }
    Ok((power / kept).min(1.0))
}

/// `(Vw − Vl) / (Vw + Vl)`, or 0 when nobody voted for either candidate.
fn relevant_margin(params: &AuditParameters) -> f64 {
    let n_wl = params.relevant_votes();
    if n_wl == 0 {
        return 0.0;
    }
    (params.winner_votes as f64 - params.loser_votes as f64) / n_wl as f64
}

/// Smallest sampling rates reaching each reported power quantile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbpEstimator {
    /// Truncation of the binomial sample-size sum.
    pub tail_mass: f64,
}

impl Default for BbpEstimator {
    fn default() -> Self {
        Self {
            tail_mass: DEFAULT_TAIL_MASS,
        }
    }
}

impl BbpEstimator {
    /// Estimator with a custom truncation.
    pub fn new(tail_mass: f64) -> Self {
        Self { tail_mass }
    }

    /// Unconditional power at `params.sampling_rate`.
    pub fn power(&self, params: &AuditParameters) -> Result<f64> {
        unconditional_power(
            relevant_margin(params),
            params.relevant_votes(),
            params.sampling_rate,
            params.risk_limit,
            self.tail_mass,
        )
    }

    /// Smallest `π = k / N` whose power reaches `power`, or 1 if none does.
    pub fn sample_rate_for_power(&self, params: &AuditParameters, power: f64) -> Result<f64> {
        let rates = self.sweep(params, &[power])?;
        Ok(rates[0])
    }

    /// Sampling rates for the 25/50/75/90/99 % power targets.
    ///
    /// One increasing sweep over `π` answers every target; it reports the
    /// same rates as a separate search per target would.
    pub fn sample_rates(&self, params: &AuditParameters) -> Result<PercentileSummary> {
        let targets = QUANTILES.map(|q| f64::from(q) / 100.0);
        let rates = self.sweep(params, &targets)?;
        let mut values = [1.0; 5];
        values.copy_from_slice(&rates);
        Ok(PercentileSummary::new(values))
    }

    fn sweep(&self, params: &AuditParameters, targets: &[f64]) -> Result<Vec<f64>> {
        let margin = relevant_margin(params);
        let total = params.total;
        let mut rates = vec![1.0; targets.len()];
        let mut order: Vec<usize> = (0..targets.len()).collect();
        order.sort_by(|&a, &b| targets[a].total_cmp(&targets[b]));
        let mut next = 0;
        for k in 1..=total {
            if next == order.len() {
                break;
            }
            let pi = k as f64 / total as f64;
            let power = self.power(&params.with_sampling_rate(pi))?;
            debug!(pi, power, "bbp sweep step");
            while next < order.len() && power >= targets[order[next]] {
                rates[order[next]] = pi;
                next += 1;
            }
        }
        info!(
            total,
            margin,
            alpha = params.risk_limit,
            reached = next,
            "bbp sample-rate search finished"
        );
        Ok(rates)
    }
}
