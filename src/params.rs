//! Audit parameters shared by every estimator.

use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};

/// Population and risk parameters of one contest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditParameters {
    /// Ballots cast, `N`.
    pub total: u64,
    /// Votes for the reported winner, `Vw`.
    pub winner_votes: u64,
    /// Votes for the reported loser, `Vl`.
    pub loser_votes: u64,
    /// Risk limit `α`.
    pub risk_limit: f64,
    /// Sampling rate `π` used by fixed-rate estimators.
    pub sampling_rate: f64,
}

impl AuditParameters {
    /// Builds parameters for a contest, checking `Vw + Vl <= N`.
    pub fn new(total: u64, winner_votes: u64, loser_votes: u64, risk_limit: f64) -> Result<Self> {
        if winner_votes.saturating_add(loser_votes) > total {
            return Err(AuditError::InvalidTally {
                total,
                winner: winner_votes,
                loser: loser_votes,
            });
        }
        Ok(Self {
            total,
            winner_votes,
            loser_votes,
            risk_limit,
            sampling_rate: 0.0,
        })
    }

    /// Two-candidate contest where the winner holds `prop_w` of all `total` ballots.
    pub fn from_proportion(total: u64, prop_w: f64, risk_limit: f64) -> Self {
        let winner_votes = ((total as f64) * prop_w).round().min(total as f64) as u64;
        Self {
            total,
            winner_votes,
            loser_votes: total - winner_votes,
            risk_limit,
            sampling_rate: 0.0,
        }
    }

    /// Returns a copy with the sampling rate set to `rate`.
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Ballots cast for neither the winner nor the loser.
    pub fn other_votes(&self) -> u64 {
        self.total - self.winner_votes - self.loser_votes
    }

    /// Ballots cast for the winner or the loser.
    pub fn relevant_votes(&self) -> u64 {
        self.winner_votes + self.loser_votes
    }

    /// `(Vw − Vl) / N`.
    pub fn margin(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.winner_votes as f64 - self.loser_votes as f64) / self.total as f64
    }

    /// Winner's share of the relevant ballots, `Vw / (Vw + Vl)`.
    pub fn winner_share(&self) -> f64 {
        let relevant = self.relevant_votes();
        if relevant == 0 {
            return 0.5;
        }
        self.winner_votes as f64 / relevant as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overfull_tally() {
        assert!(matches!(
            AuditParameters::new(10, 6, 5, 0.1),
            Err(AuditError::InvalidTally { total: 10, .. })
        ));
    }

    #[test]
    fn derived_quantities() {
        let params = AuditParameters::new(1000, 600, 300, 0.05).unwrap();
        assert_eq!(params.other_votes(), 100);
        assert!((params.margin() - 0.3).abs() < 1e-12);
        assert!((params.winner_share() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn proportion_splits_whole_population() {
        let params = AuditParameters::from_proportion(10_000, 0.55, 0.1);
        assert_eq!(params.winner_votes, 5_500);
        assert_eq!(params.loser_votes, 4_500);
        assert_eq!(params.other_votes(), 0);
        assert!((params.winner_share() - 0.55).abs() < 1e-12);
    }
}
