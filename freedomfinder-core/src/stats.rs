//! Running statistics across the trials of one robustness pass.
//!
//! Every push recomputes mean and population standard deviation over the full
//! history. There is no incremental approximation, so the snapshot after trial
//! `n` is exactly the statistic of the first `n` values.
//!
//! `cv = std / mean` is `NaN` when the mean is exactly zero. Callers treat a
//! `NaN` cv as "insufficient signal", not as a fault.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Metric, OutcomeRecord};
use crate::window::Window;

// ─── Single metric ───────────────────────────────────────────────────

/// Observed values of one metric plus derived statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStat {
    values: Vec<f64>,
    mean: f64,
    std: f64,
    cv: f64,
    positive: usize,
}

impl RunningStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
        if value > 0.0 {
            self.positive += 1;
        }

        let n = self.values.len() as f64;
        self.mean = self.values.iter().sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|v| (v - self.mean).powi(2))
            .sum::<f64>()
            / n;
        self.std = variance.sqrt();
        self.cv = if self.mean == 0.0 {
            f64::NAN
        } else {
            self.std / self.mean
        };
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// `NaN` before the first push.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population standard deviation. `NaN` before the first push.
    pub fn std(&self) -> f64 {
        if self.values.is_empty() {
            f64::NAN
        } else {
            self.std
        }
    }

    pub fn cv(&self) -> f64 {
        if self.values.is_empty() {
            f64::NAN
        } else {
            self.cv
        }
    }

    /// Share of strictly positive values, in percent.
    pub fn percent_positive(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.positive as f64 / self.values.len() as f64 * 100.0
    }
}

/// Point-in-time view of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub count: usize,
    pub last: f64,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
    /// Only tracked for profit/loss.
    pub percent_positive: Option<f64>,
}

// ─── Per-trial rows ──────────────────────────────────────────────────

/// One metric's raw value and running statistics after a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub metric: Metric,
    pub value: f64,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
}

/// Trial history row. The last row of a pass is the candidate's aggregated
/// statistics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    /// 1-based trial number within the pass.
    pub trial: usize,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// In `Metric::ALL` order.
    pub metrics: Vec<MetricStats>,
    pub percent_positive: f64,
    pub rr_long: f64,
    pub rr_short: f64,
}

impl StatsRow {
    pub fn stats(&self, metric: Metric) -> Option<&MetricStats> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    /// Running mean of `metric`, `NaN` if absent.
    pub fn mean(&self, metric: Metric) -> f64 {
        self.stats(metric).map_or(f64::NAN, |m| m.mean)
    }
}

// ─── Aggregator ──────────────────────────────────────────────────────

/// Per-metric running statistics for one candidate's robustness pass.
///
/// Single-owner: one pass pushes, then reads, in strict sequence.
#[derive(Debug, Clone, Default)]
pub struct TrialAggregator {
    stats: BTreeMap<Metric, RunningStat>,
    history: Vec<StatsRow>,
}

impl TrialAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: Metric, value: f64) {
        self.stats.entry(metric).or_default().push(value);
    }

    /// Push every aggregated field of `outcome`.
    pub fn push_outcome(&mut self, outcome: &OutcomeRecord) {
        for metric in Metric::ALL {
            self.push(metric, metric.value(outcome));
        }
    }

    pub fn stat(&self, metric: Metric) -> Option<&RunningStat> {
        self.stats.get(&metric)
    }

    /// `None` until `metric` has received a value.
    pub fn snapshot(&self, metric: Metric) -> Option<StatSnapshot> {
        let stat = self.stats.get(&metric)?;
        Some(StatSnapshot {
            count: stat.count(),
            last: stat.last()?,
            mean: stat.mean(),
            std: stat.std(),
            cv: stat.cv(),
            percent_positive: (metric == Metric::Pnl).then(|| stat.percent_positive()),
        })
    }

    /// Push one trial's outcome and append its history row.
    pub fn record(&mut self, window: &Window, outcome: &OutcomeRecord) -> &StatsRow {
        self.push_outcome(outcome);

        let metrics = Metric::ALL
            .iter()
            .map(|&metric| {
                let stat = &self.stats[&metric];
                MetricStats {
                    metric,
                    value: metric.value(outcome),
                    mean: stat.mean(),
                    std: stat.std(),
                    cv: stat.cv(),
                }
            })
            .collect();

        let percent_positive = self
            .stats
            .get(&Metric::Pnl)
            .map_or(f64::NAN, RunningStat::percent_positive);

        self.history.push(StatsRow {
            trial: self.history.len() + 1,
            from: window.start,
            to: window.end,
            metrics,
            percent_positive,
            rr_long: outcome.rr_long,
            rr_short: outcome.rr_short,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn trials(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[StatsRow] {
        &self.history
    }

    /// The aggregated row after the most recent trial.
    pub fn last_row(&self) -> Option<&StatsRow> {
        self.history.last()
    }

    /// Drop every value and row.
    pub fn reset(&mut self) {
        self.stats.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::Pool;
    use chrono::{Duration, TimeZone};

    fn round3(x: f64) -> f64 {
        (x * 1000.0).round() / 1000.0
    }

    fn outcome(pnl: f64, trades: f64) -> OutcomeRecord {
        OutcomeRecord {
            pnl,
            max_drawdown: 1.0,
            win_rate: 50.0,
            mod_win_rate: 50.0,
            num_trades: trades,
            trades_won: trades / 2.0,
            trades_lost: trades / 2.0,
            breakeven_trades: 0.0,
            max_wins: 2.0,
            max_losses: 2.0,
            profit_factor: 1.2,
            rr_long: 2.0,
            rr_short: 3.0,
        }
    }

    fn window() -> Window {
        let start = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        Window {
            start,
            end: start + Duration::days(7),
            pool: Pool::Full,
        }
    }

    #[test]
    fn pnl_sequence_mean_and_percent_positive() {
        let mut agg = TrialAggregator::new();
        let mut percents = Vec::new();
        for v in [10.0, -5.0, 20.0] {
            agg.push(Metric::Pnl, v);
            percents.push(round3(agg.snapshot(Metric::Pnl).unwrap().percent_positive.unwrap()));
        }
        let snap = agg.snapshot(Metric::Pnl).unwrap();
        assert_eq!(snap.count, 3);
        assert_eq!(round3(snap.mean), 8.333);
        assert_eq!(percents, vec![100.0, 50.0, 66.667]);
    }

    #[test]
    fn std_is_population_std() {
        let mut stat = RunningStat::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stat.push(v);
        }
        assert_eq!(stat.mean(), 5.0);
        assert_eq!(stat.std(), 2.0);
        assert_eq!(stat.cv(), 0.4);
    }

    #[test]
    fn zero_mean_gives_nan_cv() {
        let mut stat = RunningStat::new();
        stat.push(5.0);
        stat.push(-5.0);
        assert_eq!(stat.mean(), 0.0);
        assert_eq!(stat.std(), 5.0);
        assert!(stat.cv().is_nan());
    }

    #[test]
    fn zero_is_not_positive() {
        let mut stat = RunningStat::new();
        stat.push(0.0);
        stat.push(1.0);
        assert_eq!(stat.percent_positive(), 50.0);
    }

    #[test]
    fn empty_stat_is_nan() {
        let stat = RunningStat::new();
        assert!(stat.mean().is_nan());
        assert!(stat.std().is_nan());
        assert!(stat.percent_positive().is_nan());
    }

    #[test]
    fn percent_positive_only_for_pnl() {
        let mut agg = TrialAggregator::new();
        agg.push_outcome(&outcome(3.0, 10.0));
        assert!(agg.snapshot(Metric::Pnl).unwrap().percent_positive.is_some());
        assert!(agg
            .snapshot(Metric::NumTrades)
            .unwrap()
            .percent_positive
            .is_none());
        assert!(agg.snapshot(Metric::NumTrades).is_some());
    }

    #[test]
    fn record_builds_numbered_rows() {
        let mut agg = TrialAggregator::new();
        agg.record(&window(), &outcome(10.0, 4.0));
        let row = agg.record(&window(), &outcome(-20.0, 6.0)).clone();

        assert_eq!(row.trial, 2);
        assert_eq!(row.metrics.len(), Metric::ALL.len());
        assert_eq!(row.mean(Metric::Pnl), -5.0);
        assert_eq!(row.mean(Metric::NumTrades), 5.0);
        assert_eq!(row.stats(Metric::Pnl).unwrap().value, -20.0);
        assert_eq!(row.percent_positive, 50.0);
        assert_eq!(row.rr_short, 3.0);
        assert_eq!(agg.trials(), 2);
        assert_eq!(agg.last_row(), Some(&row));
    }

    #[test]
    fn reset_discards_history() {
        let mut agg = TrialAggregator::new();
        agg.record(&window(), &outcome(1.0, 1.0));
        agg.reset();
        assert_eq!(agg.trials(), 0);
        assert!(agg.snapshot(Metric::Pnl).is_none());
    }
}
