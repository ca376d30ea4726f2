//! Monte-Carlo workload estimate for a sequential ballot-polling audit (BPA).
//!
//! Each trial simulates an audit of a two-candidate contest: ballots are
//! drawn one at a time as Bernoulli(winner share) votes and fed to the SPRT
//! until it confirms the outcome or the population runs out.  The stopping
//! counts of many independent trials give the empirical distribution of
//! the audit workload.

use crate::params::AuditParameters;
use crate::parallel;
use crate::prng::RandomStream;
use crate::quantile::PercentileSummary;
use crate::sprt::{Ballot, SprtDecision, SprtEvaluator, SprtStep};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, trace};

/// Trials per parameter combination in the full study.
pub const DEFAULT_TRIALS: u64 = 10_000_000;

/// Outcome of one simulated audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialResult {
    /// Ballots examined when the audit stopped.
    pub samples: u64,
    /// Whether the audit confirmed the outcome before exhausting the population.
    pub rejected: bool,
}

/// Simulates one audit using a stream seeded with `seed`.
pub fn run_trial(params: &AuditParameters, seed: u64) -> TrialResult {
    let evaluator = SprtEvaluator::for_audit(params);
    let share = params.winner_share();
    let mut stream = RandomStream::new(seed);
    let mut state = evaluator.start();
    let mut decision = SprtDecision::Inconclusive;
    for _ in 0..params.total {
        let ballot = if stream.next_uniform() < share {
            Ballot::Winner
        } else {
            Ballot::Loser
        };
        if state.observe(ballot) == SprtStep::Reject {
            decision = SprtDecision::RejectNull;
            break;
        }
    }
    let outcome = state.finish(decision);
    TrialResult {
        samples: outcome.samples,
        rejected: outcome.rejected(),
    }
}

/// Raw trials plus their percentile summary.
#[derive(Debug, Clone, Serialize)]
pub struct BpaReport {
    /// Stopping-count percentiles divided by `N`.
    pub summary: PercentileSummary,
    /// Every trial, in trial-index order.
    pub trials: Vec<TrialResult>,
}

impl BpaReport {
    /// Share of trials that confirmed the outcome.
    pub fn rejection_rate(&self) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        let rejected = self.trials.iter().filter(|trial| trial.rejected).count();
        rejected as f64 / self.trials.len() as f64
    }
}

/// Runs independent simulated audits on the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpaEstimator {
    /// Number of trials.
    pub trials: u64,
    /// Trial `i` uses the stream seeded with `base_seed + i`.
    pub base_seed: u64,
}

impl Default for BpaEstimator {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            base_seed: 0,
        }
    }
}

impl BpaEstimator {
    /// Estimator running `trials` trials keyed from `base_seed`.
    pub fn new(trials: u64, base_seed: u64) -> Self {
        Self { trials, base_seed }
    }

    /// Stopping-count percentiles as fractions of the population.
    pub fn estimate(&self, params: &AuditParameters) -> PercentileSummary {
        self.estimate_with_trials(params).summary
    }

    /// Runs every trial and keeps the raw results.
    pub fn estimate_with_trials(&self, params: &AuditParameters) -> BpaReport {
        let started = Instant::now();
        let base = self.base_seed;
        let trials = parallel::map_collect(0..self.trials, |index| {
            let seed = RandomStream::for_trial(base, index).seed();
            let result = run_trial(params, seed);
            trace!(index, samples = result.samples, "bpa trial");
            result
        });
        let mut counts: Vec<u64> = trials.iter().map(|trial| trial.samples).collect();
        let scale = params.total.max(1) as f64;
        let summary = PercentileSummary::from_samples(&mut counts, scale);
        info!(
            total = params.total,
            winner_share = params.winner_share(),
            alpha = params.risk_limit,
            trials = self.trials,
            workers = parallel::worker_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bpa trials complete"
        );
        BpaReport { summary, trials }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trials_replay_from_their_seed() {
        let params = AuditParameters::from_proportion(2_000, 0.6, 0.1);
        assert_eq!(run_trial(&params, 17), run_trial(&params, 17));
    }

    #[test]
    fn landslide_stops_early() {
        let params = AuditParameters::from_proportion(10_000, 0.9, 0.1);
        let result = run_trial(&params, 0);
        assert!(result.rejected);
        assert!(result.samples < 100, "took {} ballots", result.samples);
    }

    #[test]
    fn tie_exhausts_population() {
        let params = AuditParameters::from_proportion(500, 0.5, 0.1);
        let result = run_trial(&params, 3);
        assert!(!result.rejected);
        assert_eq!(result.samples, 500);
    }

    #[test]
    fn percentiles_are_monotone() {
        let params = AuditParameters::from_proportion(5_000, 0.6, 0.1);
        let report = BpaEstimator::new(400, 0).estimate_with_trials(&params);
        assert_eq!(report.trials.len(), 400);
        assert!(report.summary.is_monotone());
        for (_, value) in report.summary.iter() {
            assert!(value > 0.0 && value <= 1.0);
        }
        assert!(report.rejection_rate() > 0.9);
    }

    #[test]
    fn estimate_is_reproducible() {
        let params = AuditParameters::from_proportion(3_000, 0.58, 0.05);
        let estimator = BpaEstimator::new(200, 99);
        assert_eq!(estimator.estimate(&params), estimator.estimate(&params));
    }

    #[test]
    fn wider_margin_needs_fewer_ballots() {
        let estimator = BpaEstimator::new(300, 0);
        let close = estimator.estimate(&AuditParameters::from_proportion(5_000, 0.55, 0.1));
        let wide = estimator.estimate(&AuditParameters::from_proportion(5_000, 0.7, 0.1));
        assert!(wide.get(50).unwrap() < close.get(50).unwrap());
    }
}
