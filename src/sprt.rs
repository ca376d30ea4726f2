//! Wald's sequential probability ratio test for ballot-polling audits.
//!
//! The statistic starts at 1 and is updated one ballot at a time: a vote
//! for the winner multiplies it by `s / 0.5`, a vote for the loser by
//! `(1 - s) / 0.5`, where `s` is the winner's share of the two-candidate
//! vote.  Any other ballot leaves it unchanged.  The null hypothesis of a
//! tie is rejected once the statistic reaches `1/α`.

use crate::params::AuditParameters;
use serde::Serialize;

/// Value observed on one sampled ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Ballot {
    /// Vote for the reported winner.
    Winner,
    /// Vote for the reported loser.
    Loser,
    /// Invalid, blank, or a vote for another candidate.
    Other,
}

/// Terminal decision of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SprtDecision {
    /// The statistic crossed `1/α`; the reported outcome is confirmed.
    RejectNull,
    /// The ballots ran out before the threshold was crossed.
    Inconclusive,
}

/// Result of running the test over a ballot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SprtOutcome {
    /// Terminal decision.
    pub decision: SprtDecision,
    /// Ballots consumed before the test stopped.
    pub samples: u64,
    /// Likelihood ratio at termination.
    pub test_statistic: f64,
}

impl SprtOutcome {
    /// `min(1, 1/test)`.
    pub fn pvalue(&self) -> f64 {
        (1.0 / self.test_statistic).min(1.0)
    }

    /// Whether the null hypothesis was rejected.
    pub fn rejected(&self) -> bool {
        self.decision == SprtDecision::RejectNull
    }
}

/// Whether a running test should keep sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprtStep {
    /// Threshold not reached; draw another ballot.
    Continue,
    /// Threshold reached.
    Reject,
}

/// Configuration of the test for one contest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprtEvaluator {
    share: f64,
    risk_limit: f64,
    popsize: u64,
}

impl SprtEvaluator {
    /// Test with winner share `share` at risk limit `risk_limit` over `popsize` ballots.
    pub fn new(share: f64, risk_limit: f64, popsize: u64) -> Self {
        Self {
            share,
            risk_limit,
            popsize,
        }
    }

    /// Test calibrated to a contest's reported tally.
    pub fn for_audit(params: &AuditParameters) -> Self {
        Self::new(params.winner_share(), params.risk_limit, params.total)
    }

    /// `1/α`.
    pub fn threshold(&self) -> f64 {
        1.0 / self.risk_limit
    }

    /// Fresh state for incremental use.
    pub fn start(&self) -> SprtState {
        SprtState {
            test: 1.0,
            samples: 0,
            winner_factor: self.share / 0.5,
            loser_factor: (1.0 - self.share) / 0.5,
            threshold: self.threshold(),
        }
    }

    /// Runs the test over `ballots`, stopping at the first threshold crossing.
    ///
    /// At most `popsize` ballots are consumed.
    pub fn evaluate<I>(&self, ballots: I) -> SprtOutcome
    where
        I: IntoIterator<Item = Ballot>,
    {
        let mut state = self.start();
        let mut ballots = ballots.into_iter();
        loop {
            if state.step() == SprtStep::Reject {
                return state.finish(SprtDecision::RejectNull);
            }
            if state.samples >= self.popsize {
                return state.finish(SprtDecision::Inconclusive);
            }
            match ballots.next() {
                Some(ballot) => {
                    state.observe(ballot);
                }
                None => return state.finish(SprtDecision::Inconclusive),
            }
        }
    }
}

/// Running statistic of one test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprtState {
    test: f64,
    samples: u64,
    winner_factor: f64,
    loser_factor: f64,
    threshold: f64,
}

impl SprtState {
    /// Folds one ballot into the statistic.
    pub fn observe(&mut self, ballot: Ballot) -> SprtStep {
        match ballot {
            Ballot::Winner => self.test *= self.winner_factor,
            Ballot::Loser => self.test *= self.loser_factor,
            Ballot::Other => {}
        }
        self.samples += 1;
        self.step()
    }

    /// Current decision without consuming a ballot.
    pub fn step(&self) -> SprtStep {
        if self.test >= self.threshold {
            SprtStep::Reject
        } else {
            SprtStep::Continue
        }
    }

    /// Current likelihood ratio.
    pub fn test_statistic(&self) -> f64 {
        self.test
    }

    /// Ballots observed so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Freezes the state into an outcome.
    pub fn finish(&self, decision: SprtDecision) -> SprtOutcome {
        SprtOutcome {
            decision,
            samples: self.samples,
            test_statistic: self.test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_never_moves_the_statistic() {
        let evaluator = SprtEvaluator::new(0.5, 0.001, u64::MAX);
        let ballots = (0..10_000).map(|i| match i % 3 {
            0 => Ballot::Winner,
            1 => Ballot::Loser,
            _ => Ballot::Other,
        });
        let outcome = evaluator.evaluate(ballots);
        assert_eq!(outcome.test_statistic, 1.0);
        assert_eq!(outcome.decision, SprtDecision::Inconclusive);
        assert_eq!(outcome.samples, 10_000);
        assert_eq!(outcome.pvalue(), 1.0);
    }

    #[test]
    fn rejects_as_soon_as_threshold_is_crossed() {
        // share 0.75 => each winner ballot multiplies by 1.5; 1/α = 10.
        // 1.5^5 = 7.59, 1.5^6 = 11.39.
        let evaluator = SprtEvaluator::new(0.75, 0.1, 100);
        let outcome = evaluator.evaluate(std::iter::repeat(Ballot::Winner));
        assert_eq!(outcome.decision, SprtDecision::RejectNull);
        assert_eq!(outcome.samples, 6);
        assert!(outcome.pvalue() <= 0.1);
    }

    #[test]
    fn other_ballots_count_but_do_not_update() {
        let evaluator = SprtEvaluator::new(0.75, 0.1, 100);
        let ballots = [
            Ballot::Other,
            Ballot::Winner,
            Ballot::Other,
            Ballot::Winner,
        ];
        let outcome = evaluator.evaluate(ballots);
        assert_eq!(outcome.decision, SprtDecision::Inconclusive);
        assert_eq!(outcome.samples, 4);
        assert!((outcome.test_statistic - 2.25).abs() < 1e-12);
        assert!((outcome.pvalue() - 1.0 / 2.25).abs() < 1e-12);
    }

    #[test]
    fn loser_ballots_shrink_the_statistic() {
        let mut state = SprtEvaluator::new(0.6, 0.05, 10).start();
        assert_eq!(state.observe(Ballot::Loser), SprtStep::Continue);
        assert!((state.test_statistic() - 0.8).abs() < 1e-12);
        assert_eq!(state.samples(), 1);
    }

    #[test]
    fn stops_when_population_is_exhausted() {
        let evaluator = SprtEvaluator::new(0.55, 0.01, 3);
        let outcome = evaluator.evaluate(std::iter::repeat(Ballot::Loser));
        assert_eq!(outcome.samples, 3);
        assert_eq!(outcome.decision, SprtDecision::Inconclusive);
    }

    #[test]
    fn audit_parameters_set_the_share() {
        let params = AuditParameters::new(100, 60, 20, 0.1).unwrap();
        let evaluator = SprtEvaluator::for_audit(&params);
        let mut state = evaluator.start();
        state.observe(Ballot::Winner);
        assert!((state.test_statistic() - 1.5).abs() < 1e-12);
        assert!((evaluator.threshold() - 10.0).abs() < 1e-12);
    }
}
