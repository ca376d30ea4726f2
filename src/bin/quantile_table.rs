//! Builds the BPA/BBP percentile table.
//!
//! For every `(alpha, total, prop_w)` combination the Monte-Carlo workload
//! percentiles and the analytic sampling rates are written as one CSV row.
//! Rows are flushed as they complete so a partial run still leaves a usable
//! table behind.

use audit_power::{
    logging, AuditParameters, BbpEstimator, BpaEstimator, RandomStream, TableConfig, TableRow,
    TableWriter,
};
use std::{env, path::PathBuf, time::Instant};
use tracing::info;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: quantile_table [options]");
    println!("  --config <file>   JSON configuration (keys of TableConfig)");
    println!("  --trials <n>      Monte-Carlo trials per combination");
    println!("  --seed <int>      base seed of the trial streams");
    println!("  --out <file>      output CSV (default data.csv)");
    println!("  --alpha <a>       risk limit; repeat for several");
    println!("  --total <n>       population size; repeat for several");
}

#[derive(Default)]
struct Overrides {
    config: Option<PathBuf>,
    trials: Option<u64>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    alphas: Vec<f64>,
    totals: Vec<u64>,
}

fn parse_args(args: Vec<String>) -> Overrides {
    let mut overrides = Overrides::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--config" => {
                overrides.config = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--config expects a value")),
                ));
            }
            "--trials" => {
                let value = iter
                    .next()
                    .unwrap_or_else(|| fatal("--trials expects a value"));
                overrides.trials = Some(
                    value
                        .parse()
                        .unwrap_or_else(|_| fatal("invalid --trials value")),
                );
            }
            "--seed" => {
                let value = iter
                    .next()
                    .unwrap_or_else(|| fatal("--seed expects a value"));
                let stream = RandomStream::from_seed_text(&value)
                    .unwrap_or_else(|err| fatal(&err.to_string()));
                overrides.seed = Some(stream.seed());
            }
            "--out" => {
                overrides.output = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--out expects a value")),
                ));
            }
            "--alpha" => {
                let value = iter
                    .next()
                    .unwrap_or_else(|| fatal("--alpha expects a value"));
                let alpha: f64 = value
                    .parse()
                    .unwrap_or_else(|_| fatal("invalid --alpha value"));
                if !(alpha > 0.0 && alpha < 1.0) {
                    fatal("--alpha must lie in (0, 1)");
                }
                overrides.alphas.push(alpha);
            }
            "--total" => {
                let value = iter
                    .next()
                    .unwrap_or_else(|| fatal("--total expects a value"));
                overrides.totals.push(
                    value
                        .parse()
                        .unwrap_or_else(|_| fatal("invalid --total value")),
                );
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    overrides
}

fn resolve_config(overrides: Overrides) -> TableConfig {
    let mut config = match &overrides.config {
        Some(path) => TableConfig::load(path)
            .unwrap_or_else(|err| fatal(&format!("failed to load {}: {err}", path.display()))),
        None => TableConfig::default(),
    };
    config
        .apply_env(|name| env::var(name).ok())
        .unwrap_or_else(|err| fatal(&err.to_string()));
    if let Some(trials) = overrides.trials {
        config.trials = trials;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(output) = overrides.output {
        config.output = output;
    }
    if !overrides.alphas.is_empty() {
        config.alphas = overrides.alphas;
    }
    if !overrides.totals.is_empty() {
        config.totals = overrides.totals;
    }
    config
}

fn main() {
    let overrides = parse_args(env::args().skip(1).collect());
    logging::init();
    let config = resolve_config(overrides);
    if config.combinations() == 0 {
        fatal("No parameter combinations selected.");
    }

    let mut writer = TableWriter::create(&config.output).unwrap_or_else(|err| {
        fatal(&format!(
            "failed to create {}: {err}",
            config.output.display()
        ))
    });
    let bpa = BpaEstimator::new(config.trials, config.seed);
    let bbp = BbpEstimator::new(config.tail_mass);
    info!(
        combinations = config.combinations(),
        trials = config.trials,
        seed = config.seed,
        output = %config.output.display(),
        "building percentile table"
    );

    let run_started = Instant::now();
    for &alpha in &config.alphas {
        for &total in &config.totals {
            for &prop_w in &config.winner_proportions {
                let started = Instant::now();
                let params = AuditParameters::from_proportion(total, prop_w, alpha);
                let row = TableRow {
                    alpha,
                    total,
                    prop_w,
                    bpa: bpa.estimate(&params),
                    bbp: bbp
                        .sample_rates(&params)
                        .unwrap_or_else(|err| fatal(&err.to_string())),
                };
                writer
                    .write_row(&row)
                    .unwrap_or_else(|err| fatal(&err.to_string()));
                info!(
                    alpha,
                    total,
                    prop_w,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "row written"
                );
            }
        }
    }
    println!(
        "{} rows written to {} in {:.1}s",
        writer.rows(),
        config.output.display(),
        run_started.elapsed().as_secs_f64()
    );
}
