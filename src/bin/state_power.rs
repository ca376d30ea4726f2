//! Per-state power of a Bernoulli ballot-polling audit.
//!
//! Usage: `state_power <state_level_data.csv> <sample_probability> <risk_limit>`
//!
//! `AUDIT_POWER_REPS` and `AUDIT_POWER_SEED` override the repetition count
//! and base seed.

use audit_power::{logging, read_records, render_table, StateLevelConfig, StateLevelEstimator};
use std::{env, fs::File, io::BufReader, time::Instant};
use tracing::info;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn usage() -> ! {
    fatal("Usage: state_power <state_level_data.csv> <sample_probability> <risk_limit>");
}

fn parse_probability(raw: &str, name: &str) -> f64 {
    let value: f64 = raw
        .parse()
        .unwrap_or_else(|_| fatal(&format!("invalid {name}: {raw}")));
    if !(0.0..=1.0).contains(&value) {
        fatal(&format!("{name} must lie in [0, 1], got {raw}"));
    }
    value
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 3 {
        usage();
    }
    logging::init();

    let pi = parse_probability(&args[1], "sample_probability");
    let alpha = parse_probability(&args[2], "risk_limit");
    let mut config = StateLevelConfig::default();
    config
        .apply_env(|name| env::var(name).ok())
        .unwrap_or_else(|err| fatal(&err.to_string()));

    let file = File::open(&args[0])
        .unwrap_or_else(|err| fatal(&format!("failed to open {}: {err}", args[0])));
    let records =
        read_records(BufReader::new(file)).unwrap_or_else(|err| fatal(&err.to_string()));
    info!(contests = records.len(), reps = config.reps, seed = config.seed, "loaded tallies");

    let started = Instant::now();
    let estimator = StateLevelEstimator::new(config.reps, config.seed);
    let reports = estimator
        .report_all(&records, pi, alpha)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    print!("{}", render_table(&reports));
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "state-level report done");
}
