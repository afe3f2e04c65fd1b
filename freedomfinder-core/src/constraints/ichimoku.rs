//! Ichimoku cloud: conversion (tenkan) and base (kijun) line lengths.

use rand::RngCore;

use super::{cap_lookback, cap_slow_lookback, ConstraintPolicy, RepairError, RepairReport};
use crate::params::{ParameterSet, ParameterSpec};

/// Ichimoku cloud: the base line (kijun) never runs faster than the
/// conversion line (tenkan).
#[derive(Debug, Clone, Copy, Default)]
pub struct IchimokuPolicy;

impl ConstraintPolicy for IchimokuPolicy {
    fn strategy_id(&self) -> &str {
        "ichimoku"
    }

    fn parameter_specs(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::integer("tenkan", 2, 60),
            ParameterSpec::integer("kijun", 2, 120),
        ]
    }

    fn repair(
        &self,
        params: &mut ParameterSet,
        candles: u64,
        rng: &mut dyn RngCore,
    ) -> Result<RepairReport, RepairError> {
        cap_lookback(params, "tenkan", candles, rng)?;
        cap_slow_lookback(params, "kijun", "tenkan", candles, rng)?;

        // Raise rather than swap: kijun's range is wider than tenkan's.
        let tenkan = params.int("tenkan")?;
        if params.int("kijun")? < tenkan {
            params.set_int("kijun", tenkan);
        }
        Ok(RepairReport::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn kijun_is_raised_to_tenkan() {
        let mut params = ParameterSet::new();
        params.set_int("tenkan", 30);
        params.set_int("kijun", 9);
        let mut rng = StdRng::seed_from_u64(0);
        IchimokuPolicy.repair(&mut params, 1000, &mut rng).unwrap();
        assert_eq!(params.int("tenkan"), Ok(30));
        assert_eq!(params.int("kijun"), Ok(30));
    }

    #[test]
    fn ordered_pair_is_untouched() {
        let mut params = ParameterSet::new();
        params.set_int("tenkan", 9);
        params.set_int("kijun", 26);
        let before = params.clone();
        let mut rng = StdRng::seed_from_u64(0);
        let report = IchimokuPolicy.repair(&mut params, 1000, &mut rng).unwrap();
        assert_eq!(params, before);
        assert!(report.calibration.is_none());
    }

    #[test]
    fn short_window_caps_both_lines() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let mut params = ParameterSet::new();
            params.set_int("tenkan", 50);
            params.set_int("kijun", 110);
            IchimokuPolicy.repair(&mut params, 40, &mut rng).unwrap();
            let tenkan = params.int("tenkan").unwrap();
            let kijun = params.int("kijun").unwrap();
            assert!((2..=20).contains(&tenkan));
            assert!(tenkan <= kijun && kijun < 40);
        }
    }
}
