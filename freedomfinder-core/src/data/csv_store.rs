//! Directory of per-instrument candle CSV files.
//!
//! Layout: `<dir>/<instrument>.csv` with header
//! `timestamp,open,high,low,close,volume` (timestamps in Unix seconds).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{DataError, HistoricalData};
use crate::domain::{Candle, DataRange};

#[derive(Debug, Clone)]
pub struct CsvCandleStore {
    dir: PathBuf,
}

impl CsvCandleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, instrument: &str) -> Result<PathBuf, DataError> {
        if instrument.is_empty()
            || instrument.contains(['/', '\\'])
            || instrument.starts_with('.')
        {
            return Err(DataError::Validation(format!(
                "invalid instrument name '{instrument}'"
            )));
        }
        Ok(self.dir.join(format!("{instrument}.csv")))
    }

    /// All stored candles for `instrument`, sorted by timestamp.
    ///
    /// Rows with an out-of-range timestamp or impossible OHLCV values are
    /// rejected with `DataError::Validation` naming the file line.
    pub fn load(&self, instrument: &str) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(instrument)?;
        if !path.exists() {
            return Err(DataError::UnknownInstrument {
                instrument: instrument.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut candles = reader
            .deserialize::<Candle>()
            .collect::<Result<Vec<_>, _>>()?;
        for (i, candle) in candles.iter().enumerate() {
            // Line 1 is the header.
            let line = i + 2;
            open_time(instrument, candle)?;
            if !candle.is_sane() {
                return Err(DataError::Validation(format!(
                    "instrument '{instrument}': line {line}: malformed candle \
                     (open {}, high {}, low {}, close {}, volume {})",
                    candle.open, candle.high, candle.low, candle.close, candle.volume
                )));
            }
        }
        candles.sort_by_key(|c| c.timestamp);

        debug!(instrument, rows = candles.len(), path = %path.display(), "loaded candles");
        Ok(candles)
    }

    /// Write `candles` as the stored series for `instrument`, replacing any existing file.
    pub fn save(&self, instrument: &str, candles: &[Candle]) -> Result<PathBuf, DataError> {
        let path = self.path_for(instrument)?;
        std::fs::create_dir_all(&self.dir)?;
        let mut writer = csv::Writer::from_path(&path)?;
        for candle in candles {
            writer.serialize(candle)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

fn open_time(instrument: &str, candle: &Candle) -> Result<DateTime<Utc>, DataError> {
    candle.time().ok_or_else(|| {
        DataError::Validation(format!(
            "instrument '{instrument}': timestamp {} is out of range",
            candle.timestamp
        ))
    })
}

impl HistoricalData for CsvCandleStore {
    fn get_range(&self, instrument: &str) -> Result<DataRange, DataError> {
        let candles = self.load(instrument)?;
        match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => Ok(DataRange::new(
                open_time(instrument, first)?,
                open_time(instrument, last)?,
            )),
            _ => Err(DataError::Empty {
                instrument: instrument.to_string(),
            }),
        }
    }

    fn get_series(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let (from, to) = (start.timestamp(), end.timestamp());
        Ok(self
            .load(instrument)?
            .into_iter()
            .filter(|c| c.timestamp >= from && c.timestamp < to)
            .collect())
    }
}
