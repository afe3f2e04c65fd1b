//! Domain types shared by the samplers, the aggregator, and the orchestrator.

pub mod bar;
pub mod outcome;
pub mod range;
pub mod timeframe;

pub use bar::Candle;
pub use outcome::{Metric, OutcomeRecord};
pub use range::DataRange;
pub use timeframe::{Timeframe, UnknownTimeframe};
