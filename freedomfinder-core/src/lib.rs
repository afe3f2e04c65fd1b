//! FreedomFinder Core: sampling, constraint repair, windows, and running statistics.
//!
//! This crate contains the building blocks of the randomized robustness search:
//! - Domain types (candles, timeframes, data ranges, outcome records, metrics)
//! - Parameter declarations, parameter sets, and independent per-parameter sampling
//! - Per-strategy constraint policies behind a registry
//! - Random window selection with a separation guard
//! - Streaming per-metric statistics across repeated trials
//! - The strategy-evaluator and historical-data seams
//! - A deterministic RNG hierarchy

pub mod constraints;
pub mod data;
pub mod domain;
pub mod evaluator;
pub mod params;
pub mod rng;
pub mod stats;
pub mod window;

pub use constraints::{ConstraintPolicy, PolicyRegistry, RepairError, RepairReport};
pub use domain::{Candle, DataRange, Metric, OutcomeRecord, Timeframe};
pub use evaluator::{EvaluationError, StrategyEvaluator};
pub use params::{InvalidSpecError, ParamValue, ParameterSet, ParameterSpec};
pub use stats::{StatsRow, TrialAggregator};
pub use window::{ConfigurationError, Pool, Window, WindowError, WindowSampler};
