//! Robustness pass: repeated trials of one candidate on separated windows.
//!
//! A pass runs `trials` evaluations of a single repaired parameter set. Every
//! window is drawn with the separation guard against the windows already used
//! in this pass, and every outcome is pushed into a fresh `TrialAggregator`.
//! The screening window is not part of the pass.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use tracing::debug;

use freedomfinder_core::stats::StatsRow;
use freedomfinder_core::{
    EvaluationError, Metric, ParameterSet, StrategyEvaluator, TrialAggregator, WindowError,
    WindowSampler,
};

/// Why a pass stopped early.
#[derive(Debug, Error)]
pub enum PassError {
    /// The candidate is discarded; the search goes on.
    #[error("trial {trial} failed: {source}")]
    Evaluation {
        trial: u32,
        #[source]
        source: EvaluationError,
    },
    /// No separated window could be drawn. `SeparationUnsatisfiable` here means
    /// this pass's own windows jammed the pool.
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// How a pass ended.
#[derive(Debug)]
pub enum PassOutcome {
    /// Every trial ran.
    Completed(TrialAggregator),
    /// `should_stop` returned true between trials.
    Interrupted { trials_run: u32 },
}

/// One candidate's robustness pass.
pub struct RobustnessPass<'a, E: StrategyEvaluator + ?Sized> {
    sampler: &'a WindowSampler,
    evaluator: &'a E,
    params: &'a ParameterSet,
    trials: u32,
    min_separation: Duration,
    max_window_attempts: u32,
    initial_capital: f64,
}

impl<'a, E: StrategyEvaluator + ?Sized> RobustnessPass<'a, E> {
    pub fn new(
        sampler: &'a WindowSampler,
        evaluator: &'a E,
        params: &'a ParameterSet,
        trials: u32,
    ) -> Self {
        Self {
            sampler,
            evaluator,
            params,
            trials,
            min_separation: Duration::hours(24),
            max_window_attempts: 10_000,
            initial_capital: 100.0,
        }
    }

    pub fn min_separation(mut self, separation: Duration) -> Self {
        self.min_separation = separation;
        self
    }

    pub fn max_window_attempts(mut self, attempts: u32) -> Self {
        self.max_window_attempts = attempts;
        self
    }

    pub fn initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    /// Run the pass.
    ///
    /// `on_trial` sees every history row as it is produced. `should_stop` is
    /// polled before each trial.
    pub fn run(
        &self,
        rng: &mut dyn RngCore,
        on_trial: &mut dyn FnMut(&StatsRow),
        should_stop: &dyn Fn() -> bool,
    ) -> Result<PassOutcome, PassError> {
        let mut aggregator = TrialAggregator::new();
        let mut used: Vec<DateTime<Utc>> = Vec::with_capacity(self.trials as usize);

        for trial in 1..=self.trials {
            if should_stop() {
                return Ok(PassOutcome::Interrupted {
                    trials_run: trial - 1,
                });
            }

            let window = self.sampler.sample_non_overlapping(
                &used,
                self.min_separation,
                self.max_window_attempts,
                rng,
            )?;
            used.push(window.start);

            let outcome = self
                .evaluator
                .evaluate(&window, self.params, self.initial_capital)
                .map_err(|source| PassError::Evaluation { trial, source })?;

            let row = aggregator.record(&window, &outcome);
            debug!(
                trial,
                from = %row.from,
                pnl = outcome.pnl,
                avg_pnl = row.mean(Metric::Pnl),
                percent_positive = row.percent_positive,
                "robustness trial"
            );
            on_trial(row);
        }

        Ok(PassOutcome::Completed(aggregator))
    }
}
