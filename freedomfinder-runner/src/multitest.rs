//! Multitest search: sample, screen, stress, accept.
//!
//! Each result slot is filled by looping over candidates:
//! 1. Draw a parameter set and repair it for the window length.
//! 2. Screen it on one random window. A PnL at or below `min_pnl` sends the
//!    search back to step 1.
//! 3. Run a robustness pass of `trials` separated windows.
//! 4. Accept if average PnL, percent positive and average trade count all beat
//!    their thresholds. Otherwise discard the whole pass and go back to step 1.
//!
//! Evaluation failures, and passes that run out of separated windows, discard
//! the candidate. Bad configuration aborts the search with an error. A cancel
//! or an exhausted budget ends it early with the candidates accepted so far.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use freedomfinder_core::constraints::{Calibration, ConstraintPolicy};
use freedomfinder_core::data::{DataError, HistoricalData};
use freedomfinder_core::params::{sample_parameters, validate_specs};
use freedomfinder_core::rng::RngHierarchy;
use freedomfinder_core::stats::StatsRow;
use freedomfinder_core::{
    ConfigurationError, DataRange, InvalidSpecError, Metric, ParameterSet, PolicyRegistry, Pool,
    RepairError, StrategyEvaluator, Timeframe, WindowError, WindowSampler,
};

use crate::config::{ConfigError, SearchConfig};
use crate::robustness::{PassError, PassOutcome, RobustnessPass};

// ─── Progress ────────────────────────────────────────────────────────

/// Which step of the candidate loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Screening,
    Robustness,
}

/// Operator-facing progress of a multitest search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultitestProgress {
    /// Candidates accepted so far.
    pub accepted: u32,
    /// Candidates wanted.
    pub target: u32,
    pub stage: Stage,
    /// 1-based trial of the current robustness pass, 0 while screening.
    pub trial: u32,
    pub trials: u32,
    pub candidates_sampled: u64,
    pub elapsed_secs: f64,
}

impl std::fmt::Display for MultitestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage {
            Stage::Screening => write!(
                f,
                "{} results complete, screening candidate {}",
                self.accepted, self.candidates_sampled
            ),
            Stage::Robustness => write!(
                f,
                "{} results complete, trial {} of {}",
                self.accepted, self.trial, self.trials
            ),
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

/// Running totals of what the search did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCounters {
    pub candidates_sampled: u64,
    pub screening_rejections: u64,
    pub robustness_rejections: u64,
    pub evaluation_failures: u64,
    /// Robustness passes abandoned because no separated window was left.
    pub separation_jams: u64,
    /// Robustness trials evaluated, including those of rejected candidates.
    pub trials_run: u64,
}

/// A candidate that passed every gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedCandidate {
    /// 1-based, in acceptance order.
    pub index: u32,
    pub fingerprint: String,
    pub params: ParameterSet,
    /// Aggregated statistics after the final trial.
    pub stats: StatsRow,
    /// One row per robustness trial.
    pub history: Vec<StatsRow>,
    pub calibration: Option<Calibration>,
}

/// Everything a search produced, including one stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub instrument: String,
    pub strategy: String,
    pub timeframe: Timeframe,
    pub pool: Pool,
    pub test_days: u32,
    pub test_hours: u32,
    pub accepted: Vec<AcceptedCandidate>,
    pub counters: SearchCounters,
    pub elapsed_secs: f64,
    pub cancelled: bool,
    /// Set when a budget ran out before `num_results` were accepted.
    pub budget_exceeded: Option<BudgetExceeded>,
}

impl SearchOutcome {
    /// Whether the search reached its target without being stopped.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.budget_exceeded.is_none()
    }
}

// ─── Budgets & errors ────────────────────────────────────────────────

/// Limit that ended a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetKind {
    ScreeningAttempts,
    Candidates,
    ElapsedTime,
    WindowAttempts,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BudgetKind::ScreeningAttempts => "screening attempts",
            BudgetKind::Candidates => "candidates",
            BudgetKind::ElapsedTime => "elapsed time",
            BudgetKind::WindowAttempts => "window attempts",
        };
        f.write_str(name)
    }
}

/// A search limit that ran out before the target was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("search budget exhausted: {kind} ({attempts})")]
pub struct BudgetExceeded {
    pub kind: BudgetKind,
    pub attempts: u64,
}

/// Errors that abort a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Repair(#[from] RepairError),
    #[error(transparent)]
    Data(#[from] DataError),
}

// ─── Search ──────────────────────────────────────────────────────────

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Run a multitest search against the data range of `config.instrument` in
/// `data`.
pub fn run_multitest_on<E: StrategyEvaluator + ?Sized>(
    config: &SearchConfig,
    registry: &PolicyRegistry,
    evaluator: &E,
    data: &dyn HistoricalData,
    progress_cb: Option<&dyn Fn(&MultitestProgress)>,
    cancel: Option<&AtomicBool>,
) -> Result<SearchOutcome, SearchError> {
    let range = data.get_range(&config.instrument)?;
    run_multitest(config, registry, evaluator, range, progress_cb, cancel)
}

/// Run a multitest search over `range`.
///
/// Stops once `config.num_results` candidates are accepted. A set `cancel`
/// flag or an exhausted budget stops it early; the outcome then holds the
/// candidates accepted so far with `cancelled` or `budget_exceeded` set.
pub fn run_multitest<E: StrategyEvaluator + ?Sized>(
    config: &SearchConfig,
    registry: &PolicyRegistry,
    evaluator: &E,
    range: DataRange,
    progress_cb: Option<&dyn Fn(&MultitestProgress)>,
    cancel: Option<&AtomicBool>,
) -> Result<SearchOutcome, SearchError> {
    config.validate()?;
    let policy: &dyn ConstraintPolicy = registry.get(&config.strategy)?;
    let specs = policy.parameter_specs();
    validate_specs(&specs)?;

    let sampler = WindowSampler::new(config.pool, config.test_length(), range, config.warmup())?;
    sampler.check_capacity(u64::from(config.trials), config.min_separation())?;

    let candles = config.window_candles();
    let budget = config.budget;
    let thresholds = config.thresholds;
    let mut rng = RngHierarchy::new(config.seed).rng_for(&config.rng_scope(), 0);

    let start_time = Instant::now();
    let over_time = || {
        budget
            .max_elapsed_secs
            .is_some_and(|max| start_time.elapsed().as_secs() >= max)
    };

    info!(
        instrument = %config.instrument,
        strategy = %config.strategy,
        timeframe = %config.timeframe,
        pool = %config.pool,
        candles,
        num_results = config.num_results,
        trials = config.trials,
        seed = config.seed,
        "multitest search started"
    );

    let mut accepted: Vec<AcceptedCandidate> = Vec::new();
    let mut counters = SearchCounters::default();
    let mut cancelled = false;
    let mut budget_exceeded: Option<BudgetExceeded> = None;
    let mut screening_attempts: u64 = 0;

    let report = |counters: &SearchCounters, accepted: usize, stage: Stage, trial: u32| {
        if let Some(cb) = progress_cb {
            cb(&MultitestProgress {
                accepted: accepted as u32,
                target: config.num_results,
                stage,
                trial,
                trials: config.trials,
                candidates_sampled: counters.candidates_sampled,
                elapsed_secs: start_time.elapsed().as_secs_f64(),
            });
        }
    };

    'search: while accepted.len() < config.num_results as usize {
        if is_cancelled(cancel) {
            cancelled = true;
            break;
        }
        if over_time() {
            budget_exceeded = Some(BudgetExceeded {
                kind: BudgetKind::ElapsedTime,
                attempts: counters.candidates_sampled,
            });
            break;
        }
        if budget
            .max_candidates
            .is_some_and(|max| counters.candidates_sampled >= max)
        {
            budget_exceeded = Some(BudgetExceeded {
                kind: BudgetKind::Candidates,
                attempts: counters.candidates_sampled,
            });
            break;
        }
        if budget
            .max_screening_attempts
            .is_some_and(|max| screening_attempts >= max)
        {
            budget_exceeded = Some(BudgetExceeded {
                kind: BudgetKind::ScreeningAttempts,
                attempts: screening_attempts,
            });
            break;
        }

        // ── Sampling ──
        counters.candidates_sampled += 1;
        screening_attempts += 1;
        let mut params = sample_parameters(&specs, &mut rng)?;
        let repair = policy.repair(&mut params, candles, &mut rng)?;
        let fingerprint = params.fingerprint();
        report(&counters, accepted.len(), Stage::Screening, 0);

        // ── Screening ──
        let window = sampler.sample(&mut rng);
        let screen_pnl = match evaluator.evaluate(&window, &params, config.initial_capital) {
            Ok(outcome) => outcome.pnl,
            Err(e) => {
                warn!(%fingerprint, error = %e, "screening evaluation failed, candidate discarded");
                counters.evaluation_failures += 1;
                continue;
            }
        };
        if !thresholds.passes_screen(screen_pnl) {
            debug!(%fingerprint, pnl = screen_pnl, min_pnl = thresholds.min_pnl, "screening rejected");
            counters.screening_rejections += 1;
            continue;
        }
        screening_attempts = 0;

        // ── Robustness pass ──
        let pass = RobustnessPass::new(&sampler, evaluator, &params, config.trials)
            .min_separation(config.min_separation())
            .max_window_attempts(budget.max_window_attempts)
            .initial_capital(config.initial_capital);
        let accepted_so_far = accepted.len();
        let mut on_trial = |row: &StatsRow| {
            counters.trials_run += 1;
            if let Some(cb) = progress_cb {
                cb(&MultitestProgress {
                    accepted: accepted_so_far as u32,
                    target: config.num_results,
                    stage: Stage::Robustness,
                    trial: row.trial as u32,
                    trials: config.trials,
                    candidates_sampled: counters.candidates_sampled,
                    elapsed_secs: start_time.elapsed().as_secs_f64(),
                });
            }
        };
        let should_stop = || is_cancelled(cancel) || over_time();

        let aggregator = match pass.run(&mut rng, &mut on_trial, &should_stop) {
            Ok(PassOutcome::Completed(aggregator)) => aggregator,
            Ok(PassOutcome::Interrupted { trials_run }) => {
                if is_cancelled(cancel) {
                    debug!(%fingerprint, trials_run, "robustness pass cancelled");
                    cancelled = true;
                    break 'search;
                }
                budget_exceeded = Some(BudgetExceeded {
                    kind: BudgetKind::ElapsedTime,
                    attempts: counters.candidates_sampled,
                });
                break 'search;
            }
            Err(PassError::Evaluation { trial, source }) => {
                warn!(%fingerprint, trial, error = %source, "robustness evaluation failed, candidate discarded");
                counters.evaluation_failures += 1;
                continue;
            }
            Err(PassError::Window(WindowError::AttemptsExhausted { attempts })) => {
                budget_exceeded = Some(BudgetExceeded {
                    kind: BudgetKind::WindowAttempts,
                    attempts: u64::from(attempts),
                });
                break 'search;
            }
            Err(PassError::Window(WindowError::Configuration(
                ConfigurationError::SeparationUnsatisfiable { used, .. },
            ))) => {
                warn!(%fingerprint, used, "no separated window left, candidate discarded");
                counters.separation_jams += 1;
                continue;
            }
            Err(PassError::Window(WindowError::Configuration(e))) => return Err(e.into()),
        };

        // ── Acceptance ──
        let Some(stats) = aggregator.last_row().cloned() else {
            continue;
        };
        match thresholds.rejection_reason(&stats) {
            None => {
                let index = accepted.len() as u32 + 1;
                info!(
                    index,
                    %fingerprint,
                    avg_pnl = stats.mean(Metric::Pnl),
                    percent_positive = stats.percent_positive,
                    "candidate accepted"
                );
                accepted.push(AcceptedCandidate {
                    index,
                    fingerprint,
                    params,
                    stats,
                    history: aggregator.history().to_vec(),
                    calibration: repair.calibration,
                });
            }
            Some(reason) => {
                debug!(%fingerprint, %reason, "robustness rejected");
                counters.robustness_rejections += 1;
            }
        }
    }

    let elapsed = start_time.elapsed().as_secs_f64();
    if let Some(exceeded) = budget_exceeded {
        warn!(
            kind = %exceeded.kind,
            attempts = exceeded.attempts,
            accepted = accepted.len(),
            "search budget exhausted, keeping results accepted so far"
        );
    }
    info!(
        accepted = accepted.len(),
        candidates = counters.candidates_sampled,
        screening_rejections = counters.screening_rejections,
        robustness_rejections = counters.robustness_rejections,
        evaluation_failures = counters.evaluation_failures,
        elapsed_secs = elapsed,
        cancelled,
        "multitest search finished"
    );

    Ok(SearchOutcome {
        instrument: config.instrument.clone(),
        strategy: config.strategy.clone(),
        timeframe: config.timeframe,
        pool: config.pool,
        test_days: config.test_days,
        test_hours: config.test_hours,
        accepted,
        counters,
        elapsed_secs: elapsed,
        cancelled,
        budget_exceeded,
    })
}
