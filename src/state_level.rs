//! Power and workload estimates for real contests.
//!
//! For each contest the estimator rebuilds the full ballot population from
//! the reported tally, repeatedly draws a Bernoulli(π) sample from it and
//! runs the SPRT on the draw.  The share of repetitions that confirm the
//! outcome is the empirical power of an audit at that sampling rate.  A
//! closed-form average sample number (ASN) gives the expected workload of a
//! purely sequential audit for comparison.

use crate::dist::{binomial, binomial_ppf};
use crate::error::{AuditError, Result};
use crate::params::AuditParameters;
use crate::parallel;
use crate::prng::RandomStream;
use crate::sprt::{Ballot, SprtEvaluator};
use crate::table::{parse_count, split_record, HeaderIndex};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::BufRead;
use tracing::info;

/// Repetitions per contest unless configured otherwise.
pub const DEFAULT_REPS: u64 = 1_000;

const REQUIRED_COLUMNS: [&str; 4] = ["label", "total", "winner", "runner-up"];

/// Reported result of one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Display name, usually the state.
    pub label: String,
    /// Ballots cast.
    pub total: u64,
    /// Votes for the winner.
    pub winner: u64,
    /// Votes for the runner-up.
    pub runner_up: u64,
}

impl AuditRecord {
    /// Audit parameters for this contest at risk limit `alpha`.
    pub fn params(&self, alpha: f64) -> Result<AuditParameters> {
        AuditParameters::new(self.total, self.winner, self.runner_up, alpha)
    }

    /// `(winner − runner-up) / total`.
    pub fn margin(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.winner as f64 - self.runner_up as f64) / self.total as f64
    }

    /// Every ballot of the contest in tally order: winner votes, loser
    /// votes, then everything else.
    pub fn population(&self) -> Vec<Ballot> {
        let others = self.total.saturating_sub(self.winner + self.runner_up);
        let mut ballots = Vec::with_capacity(self.total as usize);
        ballots.extend(std::iter::repeat(Ballot::Winner).take(self.winner as usize));
        ballots.extend(std::iter::repeat(Ballot::Loser).take(self.runner_up as usize));
        ballots.extend(std::iter::repeat(Ballot::Other).take(others as usize));
        ballots
    }
}

/// Reads contest records from CSV with columns `label,total,winner,runner-up`.
///
/// Columns may appear in any order; extra columns are ignored.  Numbers may
/// carry thousands separators.  The first malformed row aborts the read.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<AuditRecord>> {
    let mut lines = reader.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break HeaderIndex::parse(&line, &REQUIRED_COLUMNS)?;
                }
            }
            None => return Ok(Vec::new()),
        }
    };
    let mut records = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let fields = split_record(&line);
        let label = header.field(&fields, "label", line_no)?.to_string();
        let total = parse_count(header.field(&fields, "total", line_no)?, "total", line_no)?;
        let winner = parse_count(header.field(&fields, "winner", line_no)?, "winner", line_no)?;
        let runner_up = parse_count(
            header.field(&fields, "runner-up", line_no)?,
            "runner-up",
            line_no,
        )?;
        let record = AuditRecord {
            label,
            total,
            winner,
            runner_up,
        };
        if winner.saturating_add(runner_up) > total {
            return Err(AuditError::InvalidTally {
                total,
                winner,
                loser: runner_up,
            });
        }
        records.push(record);
    }
    Ok(records)
}

/// Closed-form average sample number of the sequential test.
///
/// With `s_w = p_w / (p_w + p_l)`, `z_w = ln(2 s_w)`, `z_l = ln(2 − 2 s_w)`:
/// `ASN = (ln(1/α) + z_w / 2) / (p_w z_w + p_l z_l)`.  Returns `None` when
/// the expected log-likelihood increment is not positive, i.e. the test is
/// not expected to terminate.
pub fn asn(record: &AuditRecord, alpha: f64) -> Option<f64> {
    if record.total == 0 {
        return None;
    }
    let total = record.total as f64;
    let p_w = record.winner as f64 / total;
    let p_l = record.runner_up as f64 / total;
    if p_w + p_l == 0.0 {
        return None;
    }
    let s_w = p_w / (p_w + p_l);
    let z_w = (2.0 * s_w).ln();
    let z_l = (2.0 - 2.0 * s_w).ln();
    let mut drift = 0.0;
    if p_w > 0.0 {
        drift += p_w * z_w;
    }
    if p_l > 0.0 {
        drift += p_l * z_l;
    }
    if drift.is_nan() || drift <= 0.0 {
        return None;
    }
    Some(((1.0 / alpha).ln() + 0.5 * z_w) / drift)
}

/// One row of the state-level report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    /// Contest label.
    pub label: String,
    /// Ballots cast.
    pub total: u64,
    /// `(winner − runner-up) / total`.
    pub margin: f64,
    /// Empirical power at the configured sampling rate.
    pub power: f64,
    /// Expected ballots examined at the fixed rate, `floor(N · π)`.
    pub workload: u64,
    /// `floor(ASN)`, when the sequential test is expected to stop.
    pub asn_workload: Option<u64>,
}

/// Repeated-draw power estimator for real contests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLevelEstimator {
    /// Simulated draws per contest.
    pub reps: u64,
    /// Repetition `r` uses the stream seeded with `seed + r`.
    pub seed: u64,
}

impl Default for StateLevelEstimator {
    fn default() -> Self {
        Self {
            reps: DEFAULT_REPS,
            seed: 0,
        }
    }
}

impl StateLevelEstimator {
    /// Estimator with `reps` repetitions keyed from `seed`.
    pub fn new(reps: u64, seed: u64) -> Self {
        Self { reps, seed }
    }

    /// Share of simulated Bernoulli(`pi`) audits that confirm the outcome.
    pub fn power(&self, record: &AuditRecord, pi: f64, alpha: f64) -> Result<f64> {
        if self.reps == 0 {
            return Ok(0.0);
        }
        let params = record.params(alpha)?.with_sampling_rate(pi);
        let evaluator = SprtEvaluator::for_audit(&params);
        let sample_size = binomial(params.total, params.sampling_rate)?;
        let base = record.population();
        let seed = self.seed;
        let successes = parallel::map_count(0..self.reps, |rep| {
            let mut stream = RandomStream::for_trial(seed, rep);
            let n = binomial_ppf(&sample_size, params.total, stream.next_uniform()) as usize;
            let mut ballots = base.clone();
            let (drawn, _) = ballots.partial_shuffle(&mut stream, n);
            evaluator.evaluate(drawn.iter().copied()).pvalue() <= params.risk_limit
        });
        Ok(successes as f64 / self.reps as f64)
    }

    /// Full report row for one contest.
    pub fn report(&self, record: &AuditRecord, pi: f64, alpha: f64) -> Result<StateReport> {
        let power = self.power(record, pi, alpha)?;
        let report = StateReport {
            label: record.label.clone(),
            total: record.total,
            margin: record.margin(),
            power,
            workload: (record.total as f64 * pi).floor() as u64,
            asn_workload: asn(record, alpha).map(|value| value.floor() as u64),
        };
        info!(
            label = %report.label,
            total = report.total,
            margin = report.margin,
            power = report.power,
            "state-level power estimated"
        );
        Ok(report)
    }

    /// Report rows for every contest, in input order.
    pub fn report_all(
        &self,
        records: &[AuditRecord],
        pi: f64,
        alpha: f64,
    ) -> Result<Vec<StateReport>> {
        records
            .iter()
            .map(|record| self.report(record, pi, alpha))
            .collect()
    }
}

/// Renders report rows as a Markdown table.
pub fn render_table(reports: &[StateReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "| {:>8} | {:>10} | {:>7} | {:>5} | {:>8} | {:>12} |",
        "State", "Total", "Margin", "Power", "Workload", "ASN-Workload"
    );
    let _ = writeln!(out, "|---:|---:|---:|---:|---:|---:|");
    for row in reports {
        let asn = row
            .asn_workload
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "| {:>8} | {:>10} | {:>7.4} | {:>5.2} | {:>8} | {:>12} |",
            row.label, row.total, row.margin, row.power, row.workload, asn
        );
    }
    out
}
