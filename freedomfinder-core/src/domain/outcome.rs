//! Outcome of a single strategy evaluation and the metrics aggregated from it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-shape result of one strategy evaluation over one window.
///
/// Counts are carried as `f64` because every field is fed into the running
/// statistics as a sample value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Net profit/loss of the run.
    pub pnl: f64,
    /// Peak-to-trough equity decline.
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Win rate counting breakeven exits as non-losses.
    pub mod_win_rate: f64,
    pub num_trades: f64,
    pub trades_won: f64,
    pub trades_lost: f64,
    pub breakeven_trades: f64,
    /// Longest winning streak.
    pub max_wins: f64,
    /// Longest losing streak.
    pub max_losses: f64,
    pub profit_factor: f64,
    /// Realized long-side risk:reward.
    pub rr_long: f64,
    /// Realized short-side risk:reward.
    pub rr_short: f64,
}

/// Metrics tracked by the running statistics, one per aggregated outcome field.
///
/// The realized risk:reward fields are reported as last-observed values and are
/// not aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Pnl,
    MaxDrawdown,
    WinRate,
    ModWinRate,
    NumTrades,
    TradesWon,
    TradesLost,
    BreakevenTrades,
    MaxWins,
    MaxLosses,
    ProfitFactor,
}

impl Metric {
    /// Every aggregated metric, in report column order.
    pub const ALL: [Metric; 11] = [
        Metric::Pnl,
        Metric::MaxDrawdown,
        Metric::WinRate,
        Metric::ModWinRate,
        Metric::NumTrades,
        Metric::TradesWon,
        Metric::TradesLost,
        Metric::BreakevenTrades,
        Metric::MaxWins,
        Metric::MaxLosses,
        Metric::ProfitFactor,
    ];

    /// Column prefix used in reports (`pnl`, `pnl_avg`, `pnl_std`, `pnl_cv`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Metric::Pnl => "pnl",
            Metric::MaxDrawdown => "max_dd",
            Metric::WinRate => "win_rate",
            Metric::ModWinRate => "mod_win_rate",
            Metric::NumTrades => "num_trades",
            Metric::TradesWon => "trades_won",
            Metric::TradesLost => "trades_lost",
            Metric::BreakevenTrades => "breakeven_trades",
            Metric::MaxWins => "max_wins",
            Metric::MaxLosses => "max_losses",
            Metric::ProfitFactor => "profit_factor",
        }
    }

    /// Extract this metric's value from an outcome.
    pub fn value(self, outcome: &OutcomeRecord) -> f64 {
        match self {
            Metric::Pnl => outcome.pnl,
            Metric::MaxDrawdown => outcome.max_drawdown,
            Metric::WinRate => outcome.win_rate,
            Metric::ModWinRate => outcome.mod_win_rate,
            Metric::NumTrades => outcome.num_trades,
            Metric::TradesWon => outcome.trades_won,
            Metric::TradesLost => outcome.trades_lost,
            Metric::BreakevenTrades => outcome.breakeven_trades,
            Metric::MaxWins => outcome.max_wins,
            Metric::MaxLosses => outcome.max_losses,
            Metric::ProfitFactor => outcome.profit_factor,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
