//! Serializable search configuration.
//!
//! A `SearchConfig` captures everything needed to reproduce a multitest search:
//! - Instrument, strategy and timeframe
//! - Window length, pool, warm-up and separation
//! - Acceptance thresholds and search budgets
//! - The master seed

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use freedomfinder_core::{Pool, Timeframe};

use crate::acceptance::AcceptanceThresholds;

/// Errors from loading or validating a search configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse search config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid search config: {0}")]
    Invalid(String),
}

// ─── Budgets ─────────────────────────────────────────────────────────

/// Limits on how long a search may keep looking.
///
/// Everything but the window-attempt cap is unbounded by default, so a search
/// with strict thresholds keeps sampling until it has enough results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    /// Consecutive screening rejections allowed for one result slot.
    pub max_screening_attempts: Option<u64>,
    /// Total parameter sets drawn over the whole search.
    pub max_candidates: Option<u64>,
    /// Wall-clock limit, checked between trials.
    pub max_elapsed_secs: Option<u64>,
    /// Rejection draws per separated window.
    pub max_window_attempts: u32,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_screening_attempts: None,
            max_candidates: None,
            max_elapsed_secs: None,
            max_window_attempts: 10_000,
        }
    }
}

// ─── Search config ───────────────────────────────────────────────────

fn default_initial_capital() -> f64 {
    100.0
}

fn default_trials() -> u32 {
    50
}

fn default_min_separation_hours() -> u32 {
    24
}

fn default_warmup_candles() -> u32 {
    1
}

fn default_seed() -> u64 {
    42
}

fn default_num_results() -> u32 {
    1
}

/// One multitest search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub instrument: String,
    /// Registry id of the strategy, e.g. `guppy`.
    pub strategy: String,
    pub timeframe: Timeframe,
    #[serde(default)]
    pub pool: Pool,
    #[serde(default)]
    pub test_days: u32,
    #[serde(default)]
    pub test_hours: u32,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Accepted candidates to collect before stopping.
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    /// Trials per robustness pass.
    #[serde(default = "default_trials")]
    pub trials: u32,
    #[serde(default = "default_min_separation_hours")]
    pub min_separation_hours: u32,
    /// Window starts are shifted back by this many candles.
    #[serde(default = "default_warmup_candles")]
    pub warmup_candles: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub thresholds: AcceptanceThresholds,
    #[serde(default)]
    pub budget: SearchBudget,
}

impl SearchConfig {
    /// Minimal config with every optional field at its default.
    pub fn new(instrument: &str, strategy: &str, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.to_string(),
            strategy: strategy.to_string(),
            timeframe,
            pool: Pool::default(),
            test_days: 0,
            test_hours: 0,
            initial_capital: default_initial_capital(),
            num_results: default_num_results(),
            trials: default_trials(),
            min_separation_hours: default_min_separation_hours(),
            warmup_candles: default_warmup_candles(),
            seed: default_seed(),
            thresholds: AcceptanceThresholds::default(),
            budget: SearchBudget::default(),
        }
    }

    /// Load a search config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a search config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::Invalid("instrument must not be empty".into()));
        }
        if self.strategy.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy must not be empty".into()));
        }
        if self.num_results == 0 {
            return Err(ConfigError::Invalid("num_results must be at least 1".into()));
        }
        if self.trials == 0 {
            return Err(ConfigError::Invalid("trials must be at least 1".into()));
        }
        if self.test_days == 0 && self.test_hours == 0 {
            return Err(ConfigError::Invalid(
                "test length must be positive (set test_days and/or test_hours)".into(),
            ));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.min_separation_hours == 0 {
            return Err(ConfigError::Invalid(
                "min_separation_hours must be at least 1".into(),
            ));
        }
        if self.budget.max_window_attempts == 0 {
            return Err(ConfigError::Invalid(
                "budget.max_window_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Window length.
    pub fn test_length(&self) -> Duration {
        Duration::days(i64::from(self.test_days)) + Duration::hours(i64::from(self.test_hours))
    }

    /// Candles in one window, as handed to constraint repair.
    pub fn window_candles(&self) -> u64 {
        self.timeframe.candles_in(self.test_length())
    }

    /// Backward shift of every window start.
    pub fn warmup(&self) -> Duration {
        self.timeframe.span(self.warmup_candles)
    }

    pub fn min_separation(&self) -> Duration {
        Duration::hours(i64::from(self.min_separation_hours))
    }

    /// RNG scope of this search, so searches over different instruments or
    /// strategies draw independent streams from one master seed.
    pub fn rng_scope(&self) -> String {
        format!("{}/{}/{}", self.instrument, self.strategy, self.timeframe)
    }
}
