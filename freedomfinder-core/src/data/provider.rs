//! Historical data provider trait and structured error types.
//!
//! The `HistoricalData` trait abstracts over candle sources so the search only
//! needs the range query and evaluators only need the series query.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Candle, DataRange};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no stored data for instrument '{instrument}'")]
    UnknownInstrument { instrument: String },

    #[error("stored data for instrument '{instrument}' is empty")]
    Empty { instrument: String },

    #[error("validation error: {0}")]
    Validation(String),
}

/// Source of stored price history.
pub trait HistoricalData: Send + Sync {
    /// First and last stored timestamps for `instrument`.
    fn get_range(&self, instrument: &str) -> Result<DataRange, DataError>;

    /// Candles with open time in `[start, end)`, oldest first.
    fn get_series(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError>;
}
