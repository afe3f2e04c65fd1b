//! Seam to the strategy simulation.
//!
//! The search never looks inside a backtest. It hands a window and a repaired
//! parameter set to a `StrategyEvaluator` and gets back one `OutcomeRecord`.
//! Implementations must be deterministic: the same window and parameters
//! always produce the same record.

use thiserror::Error;

use crate::domain::OutcomeRecord;
use crate::params::ParameterSet;
use crate::window::Window;

/// One failed evaluation. Never fatal to a search: the candidate is discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("malformed window: {0}")]
    MalformedWindow(String),
    #[error("not enough data in window: {available} candles, need {required}")]
    InsufficientData { available: usize, required: usize },
    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// Runs one strategy backtest over one window.
pub trait StrategyEvaluator {
    fn evaluate(
        &self,
        window: &Window,
        params: &ParameterSet,
        initial_capital: f64,
    ) -> Result<OutcomeRecord, EvaluationError>;
}

impl<F> StrategyEvaluator for F
where
    F: Fn(&Window, &ParameterSet, f64) -> Result<OutcomeRecord, EvaluationError>,
{
    fn evaluate(
        &self,
        window: &Window,
        params: &ParameterSet,
        initial_capital: f64,
    ) -> Result<OutcomeRecord, EvaluationError> {
        self(window, params, initial_capital)
    }
}
