#![deny(missing_docs)]

//! # audit_power
//!
//! Sample-size and power estimation for risk-limiting ballot-polling audits
//! of two-candidate contests.
//!
//! The crate answers one question from several angles: what fraction of the
//! ballots has to be examined before a sequential probability ratio test
//! (SPRT) confirms the reported winner at risk limit `alpha`?
//!
//! * **BPA** ([`BpaEstimator`]) simulates many audits, drawing ballots one at a
//!   time from a deterministic hash-based [`RandomStream`], and reports
//!   percentiles of the stopping counts.
//! * **BBP** ([`BbpEstimator`]) is analytic: every ballot is included
//!   independently with probability `pi`, and the unconditional power is a
//!   binomial mixture of hypergeometric tail probabilities.  The estimator
//!   reports the smallest `pi` reaching each target power.
//! * **State level** ([`StateLevelEstimator`]) reads reported tallies and
//!   estimates, per contest, the power of a Bernoulli sample together with the
//!   Wald average sample number.
//!
//! ## Usage
//!
//! ```rust
//! use audit_power::{AuditParameters, BpaEstimator, BbpEstimator};
//!
//! let params = AuditParameters::from_proportion(2_000, 0.7, 0.1);
//! let bpa = BpaEstimator::new(200, 0).estimate(&params);
//! let bbp = BbpEstimator::default().sample_rates(&params).unwrap();
//! assert!(bpa.is_monotone());
//! assert!(bbp.get(99).unwrap() <= 1.0);
//! ```
//!
//! Every random draw is keyed by an explicit seed, so repeated runs with the
//! same configuration produce identical tables.

mod bbp;
mod bpa;
pub mod config;
mod dist;
mod error;
pub mod logging;
mod parallel;
mod params;
mod prng;
mod quantile;
mod skip;
mod sprt;
pub mod state_level;
pub mod table;

pub use bbp::{unconditional_power, BbpEstimator, DEFAULT_TAIL_MASS};
pub use bpa::{run_trial, BpaEstimator, BpaReport, TrialResult, DEFAULT_TRIALS};
pub use config::{StateLevelConfig, TableConfig};
pub use dist::{binomial, binomial_pmf, binomial_ppf, Hypergeometric, PmfTable};
pub use error::{AuditError, Result};
pub use parallel::worker_count;
pub use params::AuditParameters;
pub use prng::{seed_from_value, RandomStream};
pub use quantile::{percentile, PercentileSummary, QUANTILES};
pub use skip::{geometric_gap, skip_sample, GeometricGaps, SkipSampler};
pub use sprt::{Ballot, SprtDecision, SprtEvaluator, SprtOutcome, SprtState, SprtStep};
pub use state_level::{
    asn, read_records, render_table, AuditRecord, StateLevelEstimator, StateReport,
};
pub use table::{PlotTable, TableRow, TableWriter};
