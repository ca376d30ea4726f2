//! Error type shared by the sampling engine, the estimators and the CSV layers.

use thiserror::Error;

/// Errors surfaced by `audit_power`.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A seed was supplied that is not an integer.
    #[error("{0:?} cannot be used to seed a random stream: seeds must be integers")]
    InvalidSeedKind(String),

    /// Winner and loser votes add up to more than the ballots cast.
    #[error("invalid tally: winner {winner} + loser {loser} exceeds total {total}")]
    InvalidTally {
        /// Ballots cast.
        total: u64,
        /// Votes for the reported winner.
        winner: u64,
        /// Votes for the reported loser.
        loser: u64,
    },

    /// A CSV header lacks a required column.
    #[error("missing required column `{0}`")]
    MissingColumn(String),

    /// A CSV row lacks a value for a required column.
    #[error("line {line}: missing value for `{field}`")]
    MissingField {
        /// One-based line number in the input.
        line: usize,
        /// Column name.
        field: String,
    },

    /// A CSV value could not be parsed as a number.
    #[error("line {line}: invalid number {value:?} in `{field}`")]
    InvalidNumber {
        /// One-based line number in the input.
        line: usize,
        /// Column name.
        field: String,
        /// Offending raw text.
        value: String,
    },

    /// A probability distribution rejected its parameters.
    #[error("distribution error: {0}")]
    Distribution(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be decoded.
    #[error("config decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AuditError>;
