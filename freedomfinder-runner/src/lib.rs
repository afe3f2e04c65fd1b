//! FreedomFinder Runner: multitest orchestration, acceptance, and export.
//!
//! This crate builds on `freedomfinder-core` to provide:
//! - TOML search configuration with thresholds and budgets
//! - Screening and acceptance gates
//! - The robustness pass over separated windows
//! - The multitest search loop with progress and cancellation
//! - CSV and JSON result export

pub mod acceptance;
pub mod config;
pub mod export;
pub mod multitest;
pub mod robustness;

pub use acceptance::{AcceptanceThresholds, Rejection, Verdict};
pub use config::{ConfigError, SearchBudget, SearchConfig};
pub use export::{emit, export_json, CsvResultSink, MemorySink, ResultSink};
pub use multitest::{
    run_multitest, run_multitest_on, AcceptedCandidate, BudgetExceeded, BudgetKind,
    MultitestProgress,
    SearchCounters, SearchError, SearchOutcome, Stage,
};
pub use robustness::{PassError, PassOutcome, RobustnessPass};
