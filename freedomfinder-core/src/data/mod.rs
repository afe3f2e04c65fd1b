//! Historical candle storage.

pub mod csv_store;
pub mod provider;

pub use csv_store::CsvCandleStore;
pub use provider::{DataError, HistoricalData};
