//! Strategy-specific constraint repair.
//!
//! Each strategy registers a `ConstraintPolicy` that declares its parameter
//! domains and projects an independently sampled `ParameterSet` onto the
//! subset satisfying its cross-parameter constraints. `PolicyRegistry` maps
//! strategy ids to policies so new strategies can be added without touching
//! existing ones.

pub mod capacity;
pub mod guppy;
pub mod ichimoku;
pub mod risk_reward;

use std::collections::BTreeMap;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::{sample_parameters, InvalidSpecError, ParamAccessError, ParameterSet, ParameterSpec};

pub use capacity::CapacityOnlyPolicy;
pub use guppy::GuppyPolicy;
pub use ichimoku::IchimokuPolicy;
pub use risk_reward::{Calibration, Side};

// ─── Errors & reports ────────────────────────────────────────────────

/// Errors raised while repairing a parameter set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepairError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("parameter set does not match the strategy's declarations: {0}")]
    Access(#[from] ParamAccessError),
    #[error("window of {candles} candles is too short for lookback repair (need at least {required})")]
    WindowTooShort { candles: u64, required: u64 },
}

/// What a repair pass did beyond the exact constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Risk:reward calibration outcome, for strategies that calibrate.
    pub calibration: Option<Calibration>,
}

// ─── Policy trait ────────────────────────────────────────────────────

/// Cross-parameter constraint policy for one strategy.
pub trait ConstraintPolicy: Send + Sync {
    /// Registry key, e.g. `"guppy"`.
    fn strategy_id(&self) -> &str;

    /// Parameter domains declared by this strategy.
    fn parameter_specs(&self) -> Vec<ParameterSpec>;

    /// Repair `params` in place for a window of `candles` candles.
    ///
    /// After a successful return every exact constraint of the strategy holds.
    /// Draws from `rng` only when a value has to be resampled.
    fn repair(
        &self,
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<RepairReport, RepairError>;
}

// ─── Registry ────────────────────────────────────────────────────────

/// Strategy id → constraint policy.
pub struct PolicyRegistry {
    policies: BTreeMap<String, Box<dyn ConstraintPolicy>>,
}

impl PolicyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    /// Registry with every built-in strategy: guppy, ichimoku, obv, sup_res, mfi.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GuppyPolicy);
        registry.register(IchimokuPolicy);
        registry.register(CapacityOnlyPolicy::obv());
        registry.register(CapacityOnlyPolicy::support_resistance());
        registry.register(CapacityOnlyPolicy::mfi());
        registry
    }

    /// Register a policy under its own strategy id, replacing any previous one.
    pub fn register<P: ConstraintPolicy + 'static>(&mut self, policy: P) {
        self.policies
            .insert(policy.strategy_id().to_string(), Box::new(policy));
    }

    pub fn get(&self, strategy_id: &str) -> Result<&dyn ConstraintPolicy, RepairError> {
        self.policies
            .get(strategy_id)
            .map(|p| p.as_ref())
            .ok_or_else(|| RepairError::UnknownStrategy(strategy_id.to_string()))
    }

    pub fn contains(&self, strategy_id: &str) -> bool {
        self.policies.contains_key(strategy_id)
    }

    /// Registered strategy ids in sorted order.
    pub fn strategies(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Parameter declarations of a registered strategy.
    pub fn specs(&self, strategy_id: &str) -> Result<Vec<ParameterSpec>, RepairError> {
        Ok(self.get(strategy_id)?.parameter_specs())
    }

    /// Draw a fresh, unrepaired parameter set for a registered strategy.
    pub fn sample(
        &self,
        strategy_id: &str,
        rng: &mut dyn RngCore,
    ) -> Result<ParameterSet, SampleError> {
        let specs = self.specs(strategy_id)?;
        Ok(sample_parameters(&specs, rng)?)
    }

    /// Repair `params` with the policy registered for `strategy_id`.
    pub fn repair(
        &self,
        strategy_id: &str,
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<RepairReport, RepairError> {
        self.get(strategy_id)?.repair(params, candles, rng)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Either half of sample-then-repair can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),
    #[error(transparent)]
    Repair(#[from] RepairError),
}

// ─── Shared repair steps ─────────────────────────────────────────────

/// Smallest lookback a resampled length may take.
pub const MIN_LOOKBACK: i64 = 2;

fn candles_i64(candles: u64) -> i64 {
    i64::try_from(candles).unwrap_or(i64::MAX)
}

/// Resample a lookback that does not fit in the window into `[2, candles / 2]`.
pub fn cap_lookback(
    params: &mut ParameterSet,
    name: &str,
    candles: u64,
    rng: &mut dyn RngCore,
) -> Result<(), RepairError> {
    let value = params.int(name)?;
    let limit = candles_i64(candles);
    if value < limit {
        return Ok(());
    }
    let upper = limit / 2;
    if upper < MIN_LOOKBACK {
        return Err(RepairError::WindowTooShort {
            candles,
            required: (MIN_LOOKBACK * 2) as u64,
        });
    }
    params.set_int(name, rng.gen_range(MIN_LOOKBACK..=upper));
    Ok(())
}

/// Resample a slow lookback that does not fit in the window into
/// `[fast, candles - 1]`, so it stays at or above its paired fast length.
///
/// The fast length must already fit in the window.
pub fn cap_slow_lookback(
    params: &mut ParameterSet,
    slow: &str,
    fast: &str,
    candles: u64,
    rng: &mut dyn RngCore,
) -> Result<(), RepairError> {
    let value = params.int(slow)?;
    let limit = candles_i64(candles);
    if value < limit {
        return Ok(());
    }
    let fast_value = params.int(fast)?;
    let upper = limit - 1;
    if fast_value > upper {
        return Err(RepairError::WindowTooShort {
            candles,
            required: (fast_value + 1) as u64,
        });
    }
    params.set_int(slow, rng.gen_range(fast_value..=upper));
    Ok(())
}

/// Swap a fast/slow integer pair if sampled out of order.
pub fn order_pair(params: &mut ParameterSet, fast: &str, slow: &str) -> Result<(), RepairError> {
    let fast_value = params.int(fast)?;
    let slow_value = params.int(slow)?;
    if fast_value > slow_value {
        params.set_int(fast, slow_value);
        params.set_int(slow, fast_value);
    }
    Ok(())
}

/// If both flags are disabled, re-enable exactly one, chosen by a fair coin.
pub fn ensure_one_enabled(
    params: &mut ParameterSet,
    first: &str,
    second: &str,
    rng: &mut dyn RngCore,
) -> Result<(), RepairError> {
    if !params.flag(first)? && !params.flag(second)? {
        let pick = if rng.gen_bool(0.5) { first } else { second };
        params.set_flag(pick, true);
    }
    Ok(())
}

/// Reorder three real-valued levels so that `levels[0] <= levels[1] <= levels[2]`.
pub fn sort_ladder(params: &mut ParameterSet, levels: [&str; 3]) -> Result<(), RepairError> {
    let mut values = [
        params.real(levels[0])?,
        params.real(levels[1])?,
        params.real(levels[2])?,
    ];
    values.sort_by(|a, b| a.total_cmp(b));
    for (name, value) in levels.iter().zip(values) {
        params.set_real(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn builtin_registry_lists_all_strategies() {
        let registry = PolicyRegistry::with_builtin();
        let ids: Vec<&str> = registry.strategies().collect();
        assert_eq!(ids, vec!["guppy", "ichimoku", "mfi", "obv", "sup_res"]);
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let registry = PolicyRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(1);
        let mut params = ParameterSet::new();
        assert_eq!(
            registry
                .repair("sma", &mut params, 100, &mut rng)
                .unwrap_err(),
            RepairError::UnknownStrategy("sma".into())
        );
    }

    #[test]
    fn builtin_specs_are_valid() {
        let registry = PolicyRegistry::with_builtin();
        for id in registry.strategies() {
            let specs = registry.specs(id).unwrap();
            assert!(!specs.is_empty(), "{id} declares no parameters");
            crate::params::validate_specs(&specs)
                .unwrap_or_else(|e| panic!("{id} has invalid specs: {e}"));
        }
    }

    #[test]
    fn cap_lookback_leaves_fitting_values_alone() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = ParameterSet::new();
        params.set_int("rsi_length", 49);
        cap_lookback(&mut params, "rsi_length", 50, &mut rng).unwrap();
        assert_eq!(params.int("rsi_length"), Ok(49));
    }

    #[test]
    fn cap_lookback_resamples_into_lower_half() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let mut params = ParameterSet::new();
            params.set_int("rsi_length", 50);
            cap_lookback(&mut params, "rsi_length", 50, &mut rng).unwrap();
            let v = params.int("rsi_length").unwrap();
            assert!((2..=25).contains(&v), "resampled {v} outside [2, 25]");
        }
    }

    #[test]
    fn cap_lookback_rejects_tiny_windows() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = ParameterSet::new();
        params.set_int("bb_length", 10);
        assert!(matches!(
            cap_lookback(&mut params, "bb_length", 3, &mut rng),
            Err(RepairError::WindowTooShort { candles: 3, .. })
        ));
    }

    #[test]
    fn cap_slow_lookback_stays_above_fast() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..200 {
            let mut params = ParameterSet::new();
            params.set_int("macd_fast", 12);
            params.set_int("macd_slow", 90);
            cap_slow_lookback(&mut params, "macd_slow", "macd_fast", 40, &mut rng).unwrap();
            let slow = params.int("macd_slow").unwrap();
            assert!((12..40).contains(&slow), "slow {slow} outside [12, 40)");
        }
    }

    #[test]
    fn order_pair_swaps_inverted_values() {
        let mut params = ParameterSet::new();
        params.set_int("wae_fast_length", 40);
        params.set_int("wae_slow_length", 20);
        order_pair(&mut params, "wae_fast_length", "wae_slow_length").unwrap();
        assert_eq!(params.int("wae_fast_length"), Ok(20));
        assert_eq!(params.int("wae_slow_length"), Ok(40));
    }

    #[test]
    fn ensure_one_enabled_turns_exactly_one_on() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut saw_long = false;
        let mut saw_short = false;
        for _ in 0..100 {
            let mut params = ParameterSet::new();
            params.set_flag("trade_longs", false);
            params.set_flag("trade_shorts", false);
            ensure_one_enabled(&mut params, "trade_longs", "trade_shorts", &mut rng).unwrap();
            let long = params.flag("trade_longs").unwrap();
            let short = params.flag("trade_shorts").unwrap();
            assert!(long ^ short, "exactly one side must be re-enabled");
            saw_long |= long;
            saw_short |= short;
        }
        assert!(saw_long && saw_short, "both sides should be picked over 100 draws");
    }

    #[test]
    fn sort_ladder_orders_all_three_levels() {
        let mut params = ParameterSet::new();
        params.set_real("ltp1", 3.0);
        params.set_real("ltp2", 1.0);
        params.set_real("ltp3", 2.0);
        sort_ladder(&mut params, ["ltp1", "ltp2", "ltp3"]).unwrap();
        assert_eq!(params.real("ltp1"), Ok(1.0));
        assert_eq!(params.real("ltp2"), Ok(2.0));
        assert_eq!(params.real("ltp3"), Ok(3.0));
    }

    #[test]
    fn missing_parameter_surfaces_as_access_error() {
        let mut params = ParameterSet::new();
        assert!(matches!(
            order_pair(&mut params, "tenkan", "kijun"),
            Err(RepairError::Access(ParamAccessError::Missing(_)))
        ));
    }
}
