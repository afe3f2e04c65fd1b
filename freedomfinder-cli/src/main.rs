//! FreedomFinder CLI: parameter specs, sampling, windows, and multitest searches.
//!
//! Commands:
//! - `specs`: list strategies, or the parameter domains of one strategy
//! - `sample`: draw and repair parameter sets for a window length
//! - `windows`: draw separated test windows from stored candle data
//! - `multitest`: run a search from a TOML config with an external evaluator

mod process_evaluator;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use freedomfinder_core::constraints::Calibration;
use freedomfinder_core::data::{CsvCandleStore, HistoricalData};
use freedomfinder_core::params::ParamKind;
use freedomfinder_core::rng::RngHierarchy;
use freedomfinder_core::{ParameterSet, PolicyRegistry, Pool, Timeframe, WindowSampler};
use freedomfinder_runner::export::write_json;
use freedomfinder_runner::{emit, run_multitest_on, CsvResultSink, MultitestProgress, SearchConfig, Stage};

use crate::process_evaluator::ProcessEvaluator;

#[derive(Parser)]
#[command(
    name = "freedomfinder",
    about = "FreedomFinder CLI, randomized robustness search for trading strategies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered strategies, or the parameter domains of one strategy.
    Specs {
        /// Strategy id (e.g., guppy). Lists all strategies when omitted.
        strategy: Option<String>,
    },
    /// Draw parameter sets and repair them for a window length.
    Sample {
        /// Strategy id.
        strategy: String,

        /// Candles in the test window the sets are repaired for.
        #[arg(long, default_value_t = 168)]
        candles: u64,

        /// Number of sets to draw.
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Draw separated test windows from stored candle data.
    Windows {
        /// Instrument (file stem of `<data-dir>/<instrument>.csv`).
        #[arg(long)]
        instrument: String,

        /// Candle timeframe: 1m, 5m, 15m, 30m, 1h, 4h, 1d.
        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        /// Window length in days.
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Additional window length in hours.
        #[arg(long, default_value_t = 0)]
        hours: u32,

        /// Pool to draw from: full or recent.
        #[arg(long, default_value = "full")]
        pool: Pool,

        /// Number of windows.
        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Minimum hours between window starts.
        #[arg(long, default_value_t = 24)]
        separation_hours: u32,

        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Candle directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Run a multitest search from a TOML config.
    Multitest {
        /// Path to the search config TOML.
        #[arg(long)]
        config: PathBuf,

        /// Candle directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output directory for CSV and JSON results.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Evaluator command and its arguments, after `--`.
        #[arg(last = true, required = true)]
        evaluator: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Specs { strategy } => run_specs(strategy.as_deref()),
        Commands::Sample {
            strategy,
            candles,
            count,
            seed,
        } => run_sample(&strategy, candles, count, seed),
        Commands::Windows {
            instrument,
            timeframe,
            days,
            hours,
            pool,
            count,
            separation_hours,
            seed,
            data_dir,
        } => run_windows(
            &instrument,
            timeframe,
            Duration::days(i64::from(days)) + Duration::hours(i64::from(hours)),
            pool,
            count,
            separation_hours,
            seed,
            &data_dir,
        ),
        Commands::Multitest {
            config,
            data_dir,
            output_dir,
            evaluator,
        } => run_search(&config, &data_dir, &output_dir, &evaluator),
    }
}

// ─── specs ──────────────────────────────────────────────────────────

fn run_specs(strategy: Option<&str>) -> Result<()> {
    let registry = PolicyRegistry::with_builtin();

    let Some(strategy) = strategy else {
        for id in registry.strategies() {
            let specs = registry.specs(id)?;
            println!("{id:<10} {} parameters", specs.len());
        }
        return Ok(());
    };

    let specs = registry.specs(strategy)?;
    println!("{:<20} {:<8} {:>8} {:>8} {:>8}", "name", "kind", "min", "max", "decimals");
    for spec in specs {
        match spec.kind {
            ParamKind::Integer { min, max } => {
                println!("{:<20} {:<8} {:>8} {:>8} {:>8}", spec.name, "integer", min, max, "-")
            }
            ParamKind::Real { min, max, decimals } => {
                println!("{:<20} {:<8} {:>8} {:>8} {:>8}", spec.name, "real", min, max, decimals)
            }
            ParamKind::Toggle => {
                println!("{:<20} {:<8} {:>8} {:>8} {:>8}", spec.name, "toggle", "n", "y", "-")
            }
        }
    }
    Ok(())
}

// ─── sample ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SampleLine<'a> {
    strategy: &'a str,
    candles: u64,
    fingerprint: String,
    params: &'a ParameterSet,
    calibration: Option<Calibration>,
}

fn run_sample(strategy: &str, candles: u64, count: u32, seed: u64) -> Result<()> {
    let registry = PolicyRegistry::with_builtin();
    let mut rng = RngHierarchy::new(seed).rng_for(&format!("sample/{strategy}"), 0);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for _ in 0..count {
        let mut params = registry
            .sample(strategy, &mut rng)
            .with_context(|| format!("failed to sample '{strategy}'"))?;
        let report = registry
            .repair(strategy, &mut params, candles, &mut rng)
            .with_context(|| format!("failed to repair '{strategy}' for {candles} candles"))?;
        let line = SampleLine {
            strategy,
            candles,
            fingerprint: params.fingerprint(),
            params: &params,
            calibration: report.calibration,
        };
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
    }
    Ok(())
}

// ─── windows ────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_windows(
    instrument: &str,
    timeframe: Timeframe,
    duration: Duration,
    pool: Pool,
    count: u32,
    separation_hours: u32,
    seed: u64,
    data_dir: &Path,
) -> Result<()> {
    let store = CsvCandleStore::new(data_dir);
    let range = store
        .get_range(instrument)
        .with_context(|| format!("failed to read stored range for {instrument}"))?;
    let sampler = WindowSampler::new(pool, duration, range, timeframe.span(1))?;
    let separation = Duration::hours(i64::from(separation_hours));
    sampler.check_capacity(u64::from(count), separation)?;

    info!(
        instrument,
        earliest = %range.earliest,
        latest = %range.latest,
        %pool,
        count,
        "drawing windows"
    );

    let mut rng = RngHierarchy::new(seed).rng_for(&format!("windows/{instrument}"), 0);
    let mut used: Vec<DateTime<Utc>> = Vec::new();
    for i in 1..=count {
        let window = sampler.sample_non_overlapping(&used, separation, 10_000, &mut rng)?;
        used.push(window.start);
        println!(
            "{i:>4}  {}  {}  {} candles",
            window.start.format("%Y-%m-%d %H:%M"),
            window.end.format("%Y-%m-%d %H:%M"),
            window.candles(timeframe)
        );
    }
    Ok(())
}

// ─── multitest ──────────────────────────────────────────────────────

fn run_search(
    config_path: &Path,
    data_dir: &Path,
    output_dir: &Path,
    evaluator: &[String],
) -> Result<()> {
    let config = SearchConfig::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let Some(evaluator) = ProcessEvaluator::new(evaluator, &config.instrument, config.timeframe)
    else {
        bail!("an evaluator command is required after `--`");
    };
    let evaluator = evaluator.with_data_dir(data_dir.to_path_buf());

    let store = CsvCandleStore::new(data_dir);
    let registry = PolicyRegistry::with_builtin();

    let on_progress = |p: &MultitestProgress| {
        if p.stage == Stage::Robustness {
            eprint!("\r{p}");
            if p.trial == p.trials {
                eprintln!();
            }
        }
    };

    let outcome = run_multitest_on(
        &config,
        &registry,
        &evaluator,
        &store,
        Some(&on_progress),
        None,
    )
    .context("multitest search failed")?;

    let mut sink = CsvResultSink::create(output_dir, &config)?;
    emit(&outcome, &mut sink)?;
    let json_path = output_dir.join(format!(
        "FreedomFinder_Outcome_{}_{}_{}d_{}h.json",
        config.instrument, config.timeframe, config.test_days, config.test_hours
    ));
    write_json(&outcome, &json_path)?;

    println!(
        "{} of {} results accepted from {} candidates in {:.1}s",
        outcome.accepted.len(),
        config.num_results,
        outcome.counters.candidates_sampled,
        outcome.elapsed_secs
    );
    if let Some(exceeded) = outcome.budget_exceeded {
        println!("Stopped early: {exceeded}");
    }
    println!("Statistics: {}", sink.stats_path().display());
    println!("Parameters: {}", sink.params_path().display());
    println!("Outcome:    {}", json_path.display());
    Ok(())
}
