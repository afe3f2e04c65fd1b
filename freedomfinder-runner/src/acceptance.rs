//! Acceptance gates: screening and multi-trial thresholds.
//!
//! Two gates per candidate:
//! - **Screen:** the single screening trial's PnL must beat `min_pnl`.
//! - **Accept:** after the robustness pass, average PnL, percent positive and
//!   average trade count must each beat their minimum.
//!
//! Every comparison is strict. A `NaN` statistic never passes.

use serde::{Deserialize, Serialize};

use freedomfinder_core::stats::StatsRow;
use freedomfinder_core::Metric;

// ─── Thresholds ──────────────────────────────────────────────────────

/// Caller-supplied minimums. Defaults mean "no minimum".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceThresholds {
    /// Screening trial PnL must be strictly greater.
    pub min_pnl: f64,
    /// Average PnL over the pass must be strictly greater.
    pub min_avg_pnl: f64,
    /// Percent of positive-PnL trials must be strictly greater.
    pub min_percent_positive: f64,
    /// Average trade count must be strictly greater.
    pub min_avg_trades: f64,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            min_pnl: -100.0,
            min_avg_pnl: -100.0,
            min_percent_positive: 0.0,
            min_avg_trades: 0.0,
        }
    }
}

/// Why a candidate failed the acceptance gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    AveragePnl { value: f64, minimum: f64 },
    PercentPositive { value: f64, minimum: f64 },
    AverageTrades { value: f64, minimum: f64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::AveragePnl { value, minimum } => {
                write!(f, "average pnl {value:.3} <= {minimum}")
            }
            Rejection::PercentPositive { value, minimum } => {
                write!(f, "percent positive {value:.3} <= {minimum}")
            }
            Rejection::AverageTrades { value, minimum } => {
                write!(f, "average trades {value:.3} <= {minimum}")
            }
        }
    }
}

/// Outcome of the acceptance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    Rejected(Vec<Rejection>),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl AcceptanceThresholds {
    /// Screening gate on a single trial's PnL.
    pub fn passes_screen(&self, pnl: f64) -> bool {
        pnl > self.min_pnl
    }

    /// Acceptance gate on the final aggregated row of a robustness pass.
    pub fn evaluate(&self, row: &StatsRow) -> Verdict {
        let mut reasons = Vec::new();

        let avg_pnl = row.mean(Metric::Pnl);
        if !(avg_pnl > self.min_avg_pnl) {
            reasons.push(Rejection::AveragePnl {
                value: avg_pnl,
                minimum: self.min_avg_pnl,
            });
        }

        if !(row.percent_positive > self.min_percent_positive) {
            reasons.push(Rejection::PercentPositive {
                value: row.percent_positive,
                minimum: self.min_percent_positive,
            });
        }

        let avg_trades = row.mean(Metric::NumTrades);
        if !(avg_trades > self.min_avg_trades) {
            reasons.push(Rejection::AverageTrades {
                value: avg_trades,
                minimum: self.min_avg_trades,
            });
        }

        if reasons.is_empty() {
            Verdict::Accepted
        } else {
            Verdict::Rejected(reasons)
        }
    }

    /// Every failed gate joined with "; ", or `None` if the row is accepted.
    pub fn rejection_reason(&self, row: &StatsRow) -> Option<String> {
        match self.evaluate(row) {
            Verdict::Accepted => None,
            Verdict::Rejected(reasons) => Some(
                reasons
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
