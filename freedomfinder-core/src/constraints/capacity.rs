//! Strategies whose only cross-parameter constraint is lookback capacity.

use rand::RngCore;

use super::{cap_lookback, ConstraintPolicy, RepairError, RepairReport};
use crate::params::{ParameterSet, ParameterSpec};

/// Policy that only caps lookback lengths to the window size.
#[derive(Debug, Clone)]
pub struct CapacityOnlyPolicy {
    id: &'static str,
    specs: Vec<ParameterSpec>,
    lookbacks: Vec<&'static str>,
}

impl CapacityOnlyPolicy {
    /// Custom policy. Every name in `lookbacks` must be an integer spec.
    pub fn new(id: &'static str, specs: Vec<ParameterSpec>, lookbacks: Vec<&'static str>) -> Self {
        Self {
            id,
            specs,
            lookbacks,
        }
    }

    /// On-balance volume crossed with its moving average.
    pub fn obv() -> Self {
        Self::new(
            "obv",
            vec![ParameterSpec::integer("ma_period", 2, 200)],
            vec!["ma_period"],
        )
    }

    /// Support/resistance breakout. Its parameters count price touches, not candles.
    pub fn support_resistance() -> Self {
        Self::new(
            "sup_res",
            vec![
                ParameterSpec::integer("min_points", 2, 20),
                ParameterSpec::integer("min_diff_points", 2, 100),
                ParameterSpec::integer("rounding_nb", 10, 500),
                ParameterSpec::real("take_profit", 1.0, 40.0, 1),
                ParameterSpec::real("stop_loss", 1.0, 40.0, 1),
            ],
            Vec::new(),
        )
    }

    /// Money flow index.
    pub fn mfi() -> Self {
        Self::new(
            "mfi",
            vec![
                ParameterSpec::integer("period", 2, 100),
                ParameterSpec::real("multiplier", 50.0, 200.0, 0),
                ParameterSpec::real("ypos", 2.0, 5.0, 1),
            ],
            vec!["period"],
        )
    }
}

impl ConstraintPolicy for CapacityOnlyPolicy {
    fn strategy_id(&self) -> &str {
        self.id
    }

    fn parameter_specs(&self) -> Vec<ParameterSpec> {
        self.specs.clone()
    }

    fn repair(
        &self,
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<RepairReport, RepairError> {
        for name in &self.lookbacks {
            cap_lookback(params, name, candles, rng)?;
        }
        Ok(RepairReport::default())
    }
}
