//! Guppy ribbon strategy: the full MFI / MACD / RSI / ADX / Bollinger / WAE
//! filter family with per-side stops, three-level take-profit ladders and
//! tiered exit quantities.

use rand::RngCore;

use super::risk_reward::{calibrate, SideLevels};
use super::{
    cap_lookback, cap_slow_lookback, ensure_one_enabled, order_pair, sort_ladder,
    ConstraintPolicy, RepairError, RepairReport,
};
use crate::params::{ParameterSet, ParameterSpec};

/// A 200-period trend filter cannot warm up on this many candles or fewer.
pub const EMA200_MIN_CANDLES: u64 = 200;

/// Exit-plan tier at which the first two quantities must leave room for a third.
const THREE_TIER_EXIT: i64 = 3;

const LONG: SideLevels = SideLevels {
    stop_loss: "sl_long",
    ladder: ["ltp1", "ltp2", "ltp3"],
};
const SHORT: SideLevels = SideLevels {
    stop_loss: "sl_short",
    ladder: ["stp1", "stp2", "stp3"],
};

/// Lookbacks capped into `[2, candles / 2]`, in repair order.
const LOOKBACKS: [&str; 9] = [
    "mfi_period",
    "macd_fast",
    "rsi_length",
    "adx_smoothing",
    "adx_di_length",
    "bb_length",
    "wae_fast_length",
    "wae_bb_length",
    "wae_rma_length",
];

/// Slow lookbacks capped into `[fast, candles - 1]`, as (slow, fast).
const SLOW_LOOKBACKS: [(&str, &str); 2] = [
    ("macd_slow", "macd_fast"),
    ("wae_slow_length", "wae_fast_length"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GuppyPolicy;

impl GuppyPolicy {
    fn cap_lookbacks(
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(), RepairError> {
        if candles <= EMA200_MIN_CANDLES {
            params.set_flag("ema200_long", false);
            params.set_flag("ema200_short", false);
        }
        for name in LOOKBACKS {
            cap_lookback(params, name, candles, rng)?;
        }
        for (slow, fast) in SLOW_LOOKBACKS {
            cap_slow_lookback(params, slow, fast, candles, rng)?;
        }
        Ok(())
    }

    fn cap_exit_quantities(
        params: &mut ParameterSet,
        tiers: &str,
        first: &str,
        second: &str,
    ) -> Result<(), RepairError> {
        if params.int(tiers)? == THREE_TIER_EXIT {
            let first_qty = params.real(first)?;
            if first_qty + params.real(second)? > 100.0 {
                params.set_real(second, 100.0 - first_qty);
            }
        }
        Ok(())
    }
}

impl ConstraintPolicy for GuppyPolicy {
    fn strategy_id(&self) -> &str {
        "guppy"
    }

    fn parameter_specs(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::toggle("trade_longs"),
            ParameterSpec::toggle("trade_shorts"),
            ParameterSpec::toggle("ema200_long"),
            ParameterSpec::toggle("ema200_short"),
            ParameterSpec::toggle("mfi_long"),
            ParameterSpec::toggle("mfi_short"),
            ParameterSpec::integer("mfi_period", 2, 100),
            ParameterSpec::toggle("macd_long"),
            ParameterSpec::toggle("macd_short"),
            // Fast and slow share bounds so an ordering swap never leaves a range.
            ParameterSpec::integer("macd_fast", 2, 100),
            ParameterSpec::integer("macd_slow", 2, 100),
            ParameterSpec::toggle("rsi_long"),
            ParameterSpec::toggle("rsi_short"),
            ParameterSpec::integer("rsi_length", 2, 50),
            ParameterSpec::toggle("adx_long"),
            ParameterSpec::toggle("adx_short"),
            ParameterSpec::integer("adx_smoothing", 2, 50),
            ParameterSpec::integer("adx_di_length", 2, 50),
            ParameterSpec::toggle("bb_long"),
            ParameterSpec::toggle("bb_short"),
            ParameterSpec::integer("bb_length", 2, 100),
            ParameterSpec::toggle("wae_long"),
            ParameterSpec::toggle("wae_short"),
            ParameterSpec::integer("wae_fast_length", 2, 100),
            ParameterSpec::integer("wae_slow_length", 2, 100),
            ParameterSpec::integer("wae_bb_length", 2, 100),
            ParameterSpec::integer("wae_rma_length", 2, 100),
            ParameterSpec::real("sl_long", 0.1, 2.5, 1),
            ParameterSpec::real("sl_short", 0.1, 2.5, 1),
            ParameterSpec::integer("tp_long", 1, 3),
            ParameterSpec::integer("tp_short", 1, 3),
            ParameterSpec::real("ltp1", 0.2, 5.0, 1),
            ParameterSpec::real("ltp2", 0.2, 5.0, 1),
            ParameterSpec::real("ltp3", 0.2, 5.0, 1),
            ParameterSpec::real("stp1", 0.2, 5.0, 1),
            ParameterSpec::real("stp2", 0.2, 5.0, 1),
            ParameterSpec::real("stp3", 0.2, 5.0, 1),
            ParameterSpec::real("ltp1_qty", 10.0, 90.0, 0),
            ParameterSpec::real("ltp2_qty", 10.0, 90.0, 0),
            ParameterSpec::real("stp1_qty", 10.0, 90.0, 0),
            ParameterSpec::real("stp2_qty", 10.0, 90.0, 0),
        ]
    }

    fn repair(
        &self,
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<RepairReport, RepairError> {
        Self::cap_lookbacks(params, candles, rng)?;

        ensure_one_enabled(params, "trade_longs", "trade_shorts", rng)?;

        order_pair(params, "wae_fast_length", "wae_slow_length")?;

        sort_ladder(params, LONG.ladder)?;
        sort_ladder(params, SHORT.ladder)?;

        Self::cap_exit_quantities(params, "tp_long", "ltp1_qty", "ltp2_qty")?;
        Self::cap_exit_quantities(params, "tp_short", "stp1_qty", "stp2_qty")?;

        let calibration = calibrate(params, LONG, SHORT, rng)?;

        order_pair(params, "macd_fast", "macd_slow")?;

        Ok(RepairReport {
            calibration: Some(calibration),
        })
    }
}
