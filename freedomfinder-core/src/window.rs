//! Random historical window selection.
//!
//! A `WindowSampler` is built once per search from the pool, the test length
//! and the instrument's available range. Construction validates that the range
//! can hold a window at all; sampling then never fails except for the
//! separation guard.
//!
//! Start candidates are drawn uniformly at one-second resolution from
//! `[lo, hi]` and then shifted earlier by the warm-up span:
//!
//! ```text
//!   full:    lo = earliest + warmup            hi = latest - duration
//!   recent:  lo = max(latest - 365d, earliest + warmup)
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DataRange, Timeframe};

/// Length of the "recent portion" pool.
pub const RECENT_POOL_DAYS: i64 = 365;

/// Which part of the available history windows are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    /// Anywhere in the stored history.
    #[default]
    Full,
    /// Only the most recent year.
    #[serde(alias = "last_year")]
    Recent,
}

impl Pool {
    pub fn as_str(self) -> &'static str {
        match self {
            Pool::Full => "full",
            Pool::Recent => "recent",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "f" => Ok(Pool::Full),
            "recent" | "last_year" | "l" => Ok(Pool::Recent),
            other => Err(format!("unknown pool '{other}' (expected 'full' or 'recent')")),
        }
    }
}

/// Half-open interval `[start, end)` of fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub pool: Pool,
}

impl Window {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    /// Number of `timeframe` candles the window holds.
    pub fn candles(&self, timeframe: Timeframe) -> u64 {
        timeframe.candles_in(self.duration())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// The requested window cannot be drawn from the available data. Fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("window duration must be positive (got {secs}s)")]
    NonPositiveDuration { secs: i64 },
    #[error("warm-up shift must not be negative (got {secs}s)")]
    NegativeWarmup { secs: i64 },
    #[error("available range of {available_secs}s cannot hold a {requested_secs}s window plus warm-up")]
    RangeTooShort {
        available_secs: i64,
        requested_secs: i64,
    },
    #[error("a {requested_secs}s window does not fit in the recent-history pool")]
    EmptyRecentPool { requested_secs: i64 },
    #[error("minimum separation must be positive (got {secs}s)")]
    NonPositiveSeparation { secs: i64 },
    #[error("no start is at least {separation_secs}s away from the {used} window(s) already used")]
    SeparationUnsatisfiable { used: usize, separation_secs: i64 },
    #[error("{requested} windows {separation_secs}s apart do not fit in the pool (at most {capacity})")]
    /// `capacity` is the count every random placement can reach.
    TooManyWindows {
        requested: u64,
        capacity: u64,
        separation_secs: i64,
    },
}

/// Failure of a separated draw.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Feasible, but the rejection loop ran out of attempts.
    #[error("no separated window found after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

// ─── Sampler ─────────────────────────────────────────────────────────

/// Draws windows of one fixed duration from one pool of one data range.
#[derive(Debug, Clone)]
pub struct WindowSampler {
    pool: Pool,
    duration: Duration,
    warmup: Duration,
    /// Inclusive bounds on the unshifted start, Unix seconds.
    lo: i64,
    hi: i64,
}

impl WindowSampler {
    pub fn new(
        pool: Pool,
        duration: Duration,
        range: DataRange,
        warmup: Duration,
    ) -> Result<Self, ConfigurationError> {
        if duration <= Duration::zero() {
            return Err(ConfigurationError::NonPositiveDuration {
                secs: duration.num_seconds(),
            });
        }
        if warmup < Duration::zero() {
            return Err(ConfigurationError::NegativeWarmup {
                secs: warmup.num_seconds(),
            });
        }

        let requested = duration + warmup;
        if range.span() < requested {
            return Err(ConfigurationError::RangeTooShort {
                available_secs: range.span().num_seconds(),
                requested_secs: requested.num_seconds(),
            });
        }

        let earliest = (range.earliest + warmup).timestamp();
        let hi = (range.latest - duration).timestamp();
        let lo = match pool {
            Pool::Full => earliest,
            Pool::Recent => {
                let recent = (range.latest - Duration::days(RECENT_POOL_DAYS)).timestamp();
                if recent > hi {
                    return Err(ConfigurationError::EmptyRecentPool {
                        requested_secs: duration.num_seconds(),
                    });
                }
                recent.max(earliest)
            }
        };

        Ok(Self {
            pool,
            duration,
            warmup,
            lo,
            hi,
        })
    }

    pub fn pool(&self) -> Pool {
        self.pool
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn window_at(&self, draw: i64) -> Window {
        // lo/hi come from valid DateTimes, so every draw in between is valid too.
        let drawn = DateTime::from_timestamp(draw, 0).unwrap_or_default();
        let start = drawn - self.warmup;
        Window {
            start,
            end: start + self.duration,
            pool: self.pool,
        }
    }

    /// Draw one window with no separation requirement.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Window {
        self.window_at(rng.gen_range(self.lo..=self.hi))
    }

    /// Upper bound on how many windows with pairwise start distance of at
    /// least `separation` fit in the pool.
    pub fn max_separated_starts(&self, separation: Duration) -> u64 {
        let sep = separation.num_seconds();
        if sep <= 0 {
            return u64::MAX;
        }
        ((self.hi - self.lo) / sep) as u64 + 1
    }

    /// How many windows one-at-a-time random draws always manage to place.
    ///
    /// Each used start blocks fewer than `2 * separation` seconds of the pool,
    /// so after `k <= span / (2 * separation)` draws a free start is left no
    /// matter where the earlier ones landed.
    pub fn guaranteed_separated_starts(&self, separation: Duration) -> u64 {
        let sep = separation.num_seconds();
        if sep <= 0 {
            return u64::MAX;
        }
        ((self.hi - self.lo) / sep.saturating_mul(2)) as u64 + 1
    }

    /// Fail fast unless `count` separated windows can always be drawn.
    ///
    /// Checks against `guaranteed_separated_starts`, not the best-case
    /// packing: random placement can jam well short of the latter.
    pub fn check_capacity(&self, count: u64, separation: Duration) -> Result<(), ConfigurationError> {
        let capacity = self.guaranteed_separated_starts(separation);
        if count > capacity {
            return Err(ConfigurationError::TooManyWindows {
                requested: count,
                capacity,
                separation_secs: separation.num_seconds(),
            });
        }
        Ok(())
    }

    /// Whether any start in the pool is at least `sep` seconds from every used
    /// start. Sweeps the excluded intervals in start order.
    fn has_free_start(&self, used: &[i64], sep: i64) -> bool {
        let mut sorted = used.to_vec();
        sorted.sort_unstable();
        let mut cursor = self.lo;
        for u in sorted {
            if cursor > self.hi {
                return false;
            }
            if cursor <= u.saturating_sub(sep) {
                return true;
            }
            cursor = cursor.max(u.saturating_add(sep));
        }
        cursor <= self.hi
    }

    /// Draw a window whose start is at least `min_separation` away from every
    /// start in `used_starts`.
    ///
    /// Fails with `SeparationUnsatisfiable` without drawing if no such start
    /// exists, and with `AttemptsExhausted` if `max_attempts` rejection draws
    /// all land too close.
    pub fn sample_non_overlapping<R: Rng + ?Sized>(
        &self,
        used_starts: &[DateTime<Utc>],
        min_separation: Duration,
        max_attempts: u32,
        rng: &mut R,
    ) -> Result<Window, WindowError> {
        let sep = min_separation.num_seconds();
        if sep <= 0 {
            return Err(ConfigurationError::NonPositiveSeparation { secs: sep }.into());
        }

        // Compare in draw space: every start carries the same warm-up shift.
        let shift = self.warmup.num_seconds();
        let used: Vec<i64> = used_starts.iter().map(|s| s.timestamp() + shift).collect();
        if !self.has_free_start(&used, sep) {
            return Err(ConfigurationError::SeparationUnsatisfiable {
                used: used.len(),
                separation_secs: sep,
            }
            .into());
        }

        for _ in 0..max_attempts {
            let draw = rng.gen_range(self.lo..=self.hi);
            if used.iter().all(|u| (draw - u).abs() >= sep) {
                return Ok(self.window_at(draw));
            }
        }
        Err(WindowError::AttemptsExhausted {
            attempts: max_attempts,
        })
    }
}

/// One-shot draw without building a sampler.
pub fn sample_window<R: Rng + ?Sized>(
    pool: Pool,
    duration: Duration,
    range: DataRange,
    warmup: Duration,
    rng: &mut R,
) -> Result<Window, ConfigurationError> {
    Ok(WindowSampler::new(pool, duration, range, warmup)?.sample(rng))
}

/// One-shot separated draw without building a sampler.
#[allow(clippy::too_many_arguments)]
pub fn sample_non_overlapping<R: Rng + ?Sized>(
    pool: Pool,
    duration: Duration,
    range: DataRange,
    warmup: Duration,
    used_starts: &[DateTime<Utc>],
    min_separation: Duration,
    max_attempts: u32,
    rng: &mut R,
) -> Result<Window, WindowError> {
    WindowSampler::new(pool, duration, range, warmup)?.sample_non_overlapping(
        used_starts,
        min_separation,
        max_attempts,
        rng,
    )
}
