//! Run configuration for the table generator and the state-level report.
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! environment overrides, then command-line flags applied by the binaries.

use crate::bbp::DEFAULT_TAIL_MASS;
use crate::bpa::DEFAULT_TRIALS;
use crate::error::{AuditError, Result};
use crate::prng::seed_from_value;
use crate::state_level::DEFAULT_REPS;
use crate::table::default_output;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the number of Monte-Carlo trials.
pub const ENV_TRIALS: &str = "AUDIT_POWER_TRIALS";
/// Overrides the base seed.
pub const ENV_SEED: &str = "AUDIT_POWER_SEED";
/// Overrides the table output path.
pub const ENV_OUT: &str = "AUDIT_POWER_OUT";
/// Overrides the state-level repetition count.
pub const ENV_REPS: &str = "AUDIT_POWER_REPS";

fn default_alphas() -> Vec<f64> {
    vec![0.1]
}

fn default_totals() -> Vec<u64> {
    vec![10_000, 1_000_000]
}

/// Winner shares 0.51, 0.52, …, 0.99.
fn default_winner_proportions() -> Vec<f64> {
    (51..100).map(|pct| f64::from(pct) / 100.0).collect()
}

fn default_trials() -> u64 {
    DEFAULT_TRIALS
}

fn default_tail_mass() -> f64 {
    DEFAULT_TAIL_MASS
}

fn default_reps() -> u64 {
    DEFAULT_REPS
}

/// Parameter grid and estimator settings for the percentile table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Risk limits to tabulate.
    #[serde(default = "default_alphas")]
    pub alphas: Vec<f64>,
    /// Population sizes to tabulate.
    #[serde(default = "default_totals")]
    pub totals: Vec<u64>,
    /// Winner shares to tabulate.
    #[serde(default = "default_winner_proportions")]
    pub winner_proportions: Vec<f64>,
    /// Monte-Carlo trials per combination.
    #[serde(default = "default_trials")]
    pub trials: u64,
    /// Base seed for trial streams.
    #[serde(default)]
    pub seed: u64,
    /// Binomial mass dropped from each tail of the analytic sum.
    #[serde(default = "default_tail_mass")]
    pub tail_mass: f64,
    /// Output CSV path.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            alphas: default_alphas(),
            totals: default_totals(),
            winner_proportions: default_winner_proportions(),
            trials: default_trials(),
            seed: 0,
            tail_mass: default_tail_mass(),
            output: default_output(),
        }
    }
}

impl TableConfig {
    /// Decodes a JSON configuration; absent keys keep their defaults.
    ///
    /// A `seed` that is not an integer fails with
    /// [`AuditError::InvalidSeedKind`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        if let Some(seed) = raw.get("seed") {
            seed_from_value(seed)?;
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Applies overrides from a variable lookup (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TRIALS) {
            self.trials = parse_env_count(ENV_TRIALS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            self.seed = crate::prng::RandomStream::from_seed_text(&raw)?.seed();
        }
        if let Some(raw) = lookup(ENV_OUT) {
            self.output = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Number of `(alpha, total, prop_w)` combinations.
    pub fn combinations(&self) -> usize {
        self.alphas.len() * self.totals.len() * self.winner_proportions.len()
    }
}

/// Settings of the state-level report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLevelConfig {
    /// Simulated draws per contest.
    pub reps: u64,
    /// Base seed for repetition streams.
    pub seed: u64,
}

impl Default for StateLevelConfig {
    fn default() -> Self {
        Self {
            reps: default_reps(),
            seed: 0,
        }
    }
}

impl StateLevelConfig {
    /// Applies `AUDIT_POWER_REPS` and `AUDIT_POWER_SEED` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_REPS) {
            self.reps = parse_env_count(ENV_REPS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            self.seed = crate::prng::RandomStream::from_seed_text(&raw)?.seed();
        }
        Ok(())
    }
}

fn parse_env_count(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AuditError::InvalidNumber {
            line: 0,
            field: name.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_cover_the_study_grid() {
        let config = TableConfig::default();
        assert_eq!(config.winner_proportions.len(), 49);
        assert_eq!(config.winner_proportions[0], 0.51);
        assert_eq!(config.winner_proportions[48], 0.99);
        assert_eq!(config.combinations(), 98);
        assert_eq!(config.trials, 10_000_000);
    }

    #[test]
    fn json_overrides_only_given_keys() {
        let config = TableConfig::from_json_str(r#"{"alphas":[0.05,0.01],"trials":1000}"#).unwrap();
        assert_eq!(config.alphas, vec![0.05, 0.01]);
        assert_eq!(config.trials, 1000);
        assert_eq!(config.totals, vec![10_000, 1_000_000]);
    }

    #[test]
    fn json_seed_must_be_integer() {
        assert!(matches!(
            TableConfig::from_json_str(r#"{"seed":1.5}"#),
            Err(AuditError::InvalidSeedKind(_))
        ));
        assert!(matches!(
            TableConfig::from_json_str(r#"{"unknown":1}"#),
            Err(AuditError::Json(_))
        ));
    }

    #[test]
    fn environment_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_TRIALS, "500"), (ENV_SEED, "9"), (ENV_OUT, "out.csv")]
            .into_iter()
            .collect();
        let mut config = TableConfig::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.trials, 500);
        assert_eq!(config.seed, 9);
        assert_eq!(config.output, PathBuf::from("out.csv"));

        let mut state = StateLevelConfig::default();
        assert!(matches!(
            state.apply_env(|name| (name == ENV_SEED).then(|| "x".to_string())),
            Err(AuditError::InvalidSeedKind(_))
        ));
        state
            .apply_env(|name| (name == ENV_REPS).then(|| "25".to_string()))
            .unwrap();
        assert_eq!(state.reps, 25);
    }
}
