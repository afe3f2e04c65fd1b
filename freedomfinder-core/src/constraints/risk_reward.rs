//! Fee-aware risk:reward calibration.
//!
//! Entries always pay the market (taker) fee. A winning exit is a resting
//! take-profit and pays the limit (maker) fee; a losing exit is a stop and pays
//! the market fee. Position size comes from a step function over the stop-loss
//! distance, so tighter stops trade larger.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::RepairError;
use crate::params::{round_to, ParameterSet};

pub const MARKET_FEE: f64 = 0.0006;
pub const LIMIT_FEE: f64 = 0.0001;

/// Open band a calibrated ratio must fall strictly inside.
pub const RR_BAND: (f64, f64) = (1.5, 15.0);

/// Upper bound on ratio evaluations per calibration.
pub const MAX_CALIBRATION_ITERATIONS: u32 = 20;

/// Fallback range for re-drawn stop-loss percentages (one decimal).
pub const FALLBACK_STOP_LOSS: (f64, f64) = (0.1, 2.5);
/// Fallback range for re-drawn first take-profit percentages (one decimal).
pub const FALLBACK_TAKE_PROFIT: (f64, f64) = (0.2, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Outcome of one calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub rr_long: f64,
    pub rr_short: f64,
    /// Number of ratio evaluations performed (1..=20).
    pub iterations: u32,
    /// Whether both ratios ended strictly inside `RR_BAND`.
    pub in_band: bool,
}

/// Parameter names holding one side's stop-loss and take-profit ladder.
#[derive(Debug, Clone, Copy)]
pub struct SideLevels {
    pub stop_loss: &'static str,
    pub ladder: [&'static str; 3],
}

/// Base position size for a stop-loss distance given in percent.
pub fn base_position_size(stop_loss_pct: f64) -> f64 {
    match stop_loss_pct {
        s if s > 0.0 && s < 0.2 => 100.0,
        s if (0.2..0.25).contains(&s) => 80.0,
        s if (0.25..0.33).contains(&s) => 60.0,
        s if (0.33..0.5).contains(&s) => 50.0,
        s if (0.5..0.67).contains(&s) => 30.0,
        s if (0.67..0.8).contains(&s) => 25.0,
        s if (0.8..1.25).contains(&s) => 20.0,
        s if (1.25..1.67).contains(&s) => 15.0,
        s if (1.67..=2.5).contains(&s) => 10.0,
        _ => 1.0,
    }
}

/// Net-of-fees reward over risk for one side, rounded to three decimals.
pub fn realized_risk_reward(side: Side, stop_loss_pct: f64, take_profit_pct: f64) -> f64 {
    let size = base_position_size(stop_loss_pct);
    let tp = take_profit_pct / 100.0;
    let sl = stop_loss_pct / 100.0;

    let entry_fee = size * MARKET_FEE;
    let (win_fee, loss_fee) = match side {
        Side::Long => (
            size * (1.0 + tp) * LIMIT_FEE,
            size * (1.0 - sl) * MARKET_FEE,
        ),
        Side::Short => (
            size * (1.0 - tp) * LIMIT_FEE,
            size * (1.0 + sl) * MARKET_FEE,
        ),
    };

    let reward = size * tp - entry_fee - win_fee;
    let risk = size * sl + entry_fee + loss_fee;
    round_to(reward / risk, 3)
}

pub fn in_band(rr: f64) -> bool {
    rr > RR_BAND.0 && rr < RR_BAND.1
}

fn side_ratio(params: &ParameterSet, side: Side, levels: SideLevels) -> Result<f64, RepairError> {
    Ok(realized_risk_reward(
        side,
        params.real(levels.stop_loss)?,
        params.real(levels.ladder[0])?,
    ))
}

/// Raise the upper rungs of a ladder to at least the rung below them.
fn lift_ladder(params: &mut ParameterSet, ladder: [&str; 3]) -> Result<(), RepairError> {
    let mut floor = params.real(ladder[0])?;
    for name in &ladder[1..] {
        let value = params.real(name)?;
        if value < floor {
            params.set_real(name, floor);
        } else {
            floor = value;
        }
    }
    Ok(())
}

/// Re-draw one side's stop-loss and first take-profit. Higher take-profit
/// levels are lifted so the ladder stays ordered.
fn redraw_side(
    params: &mut ParameterSet,
    levels: SideLevels,
    rng: &mut dyn RngCore,
) -> Result<(), RepairError> {
    let sl = round_to(rng.gen_range(FALLBACK_STOP_LOSS.0..=FALLBACK_STOP_LOSS.1), 1);
    let tp = round_to(
        rng.gen_range(FALLBACK_TAKE_PROFIT.0..=FALLBACK_TAKE_PROFIT.1),
        1,
    );
    params.set_real(levels.stop_loss, sl);
    params.set_real(levels.ladder[0], tp);
    lift_ladder(params, levels.ladder)
}

/// Iteratively re-draw out-of-band sides until both ratios are in band or the
/// iteration cap is reached.
///
/// Best effort: after `MAX_CALIBRATION_ITERATIONS` evaluations the last state
/// is kept even if a side is still out of band. The returned ratios always
/// describe the parameter values left in `params`. A set that is already in
/// band is returned untouched without drawing from `rng`.
pub fn calibrate(
    params: &mut ParameterSet,
    long: SideLevels,
    short: SideLevels,
    rng: &mut dyn RngCore,
) -> Result<Calibration, RepairError> {
    let mut iterations = 0;
    loop {
        iterations += 1;
        let rr_long = side_ratio(params, Side::Long, long)?;
        let rr_short = side_ratio(params, Side::Short, short)?;
        let long_ok = in_band(rr_long);
        let short_ok = in_band(rr_short);

        if (long_ok && short_ok) || iterations >= MAX_CALIBRATION_ITERATIONS {
            let calibration = Calibration {
                rr_long,
                rr_short,
                iterations,
                in_band: long_ok && short_ok,
            };
            if !calibration.in_band {
                warn!(
                    rr_long,
                    rr_short, iterations, "risk:reward calibration hit its iteration cap"
                );
            }
            return Ok(calibration);
        }

        if !long_ok {
            redraw_side(params, long, rng)?;
        }
        if !short_ok {
            redraw_side(params, short, rng)?;
        }
    }
}
