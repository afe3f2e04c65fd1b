use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// First and last available timestamps of an instrument's stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl DataRange {
    pub fn new(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Self {
        Self { earliest, latest }
    }

    /// Time covered by the range. Negative if the bounds are inverted.
    pub fn span(&self) -> Duration {
        self.latest - self.earliest
    }
}
