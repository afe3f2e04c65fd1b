//! Independent per-parameter sampling.
//!
//! Each spec is drawn on its own: integers uniformly in `[min, max]`, reals
//! uniformly in `[min, max]` then rounded to the declared precision, toggles
//! by a fair coin. Cross-parameter constraints are the repair step's job.

use rand::Rng;

use super::{validate_specs, InvalidSpecError, ParamKind, ParamValue, ParameterSet, ParameterSpec};

/// Largest decimal precision a real parameter may declare.
pub const MAX_DECIMALS: u32 = 12;

/// Round `value` to `decimals` places (half away from zero).
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    (value * factor).round() / factor
}

/// Draw one value for `spec`. The spec must already be valid.
pub fn sample_value<R: Rng + ?Sized>(spec: &ParameterSpec, rng: &mut R) -> ParamValue {
    match spec.kind {
        ParamKind::Integer { min, max } => ParamValue::Int(rng.gen_range(min..=max)),
        ParamKind::Real { min, max, decimals } => {
            let raw = rng.gen_range(min..=max);
            // Rounding can step just outside a bound that is off the decimal grid.
            ParamValue::Real(round_to(raw, decimals).clamp(min, max))
        }
        ParamKind::Toggle => ParamValue::Flag(rng.gen_bool(0.5)),
    }
}

/// Draw a fresh parameter set from `specs`, one independent draw per spec in
/// declaration order.
pub fn sample_parameters<R: Rng + ?Sized>(
    specs: &[ParameterSpec],
    rng: &mut R,
) -> Result<ParameterSet, InvalidSpecError> {
    validate_specs(specs)?;
    Ok(specs
        .iter()
        .map(|spec| (spec.name.clone(), sample_value(spec, rng)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::integer("rsi_length", 2, 50),
            ParameterSpec::real("sl_long", 0.1, 2.5, 1),
            ParameterSpec::toggle("trade_longs"),
        ]
    }

    #[test]
    fn same_seed_produces_identical_sets() {
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        let a = sample_parameters(&specs(), &mut rng1).unwrap();
        let b = sample_parameters(&specs(), &mut rng2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_spec_gets_a_value_of_its_kind() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = sample_parameters(&specs(), &mut rng).unwrap();
        assert_eq!(params.len(), 3);
        assert!(params.int("rsi_length").is_ok());
        assert!(params.real("sl_long").is_ok());
        assert!(params.flag("trade_longs").is_ok());
    }

    #[test]
    fn reals_are_rounded_to_declared_precision() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let params = sample_parameters(&specs(), &mut rng).unwrap();
            let sl = params.real("sl_long").unwrap();
            assert_eq!(sl, round_to(sl, 1), "sl_long {sl} has more than one decimal");
        }
    }

    #[test]
    fn values_stay_within_bounds() {
        let specs = specs();
        let mut rng = StdRng::seed_from_u64(333);
        for _ in 0..1000 {
            let params = sample_parameters(&specs, &mut rng).unwrap();
            for spec in &specs {
                let value = params.get(&spec.name).unwrap();
                assert!(spec.contains(value), "{} = {value} out of bounds", spec.name);
            }
        }
    }

    #[test]
    fn off_grid_bounds_are_clamped_after_rounding() {
        let spec = ParameterSpec::real("odd", 0.04, 0.06, 1);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let value = sample_value(&spec, &mut rng);
            assert!(spec.contains(&value), "{value} escaped [0.04, 0.06]");
        }
    }

    #[test]
    fn toggles_take_both_values() {
        let spec = ParameterSpec::toggle("ema200_long");
        let mut rng = StdRng::seed_from_u64(99);
        let draws: Vec<ParamValue> = (0..200).map(|_| sample_value(&spec, &mut rng)).collect();
        assert!(draws.contains(&ParamValue::Flag(true)));
        assert!(draws.contains(&ParamValue::Flag(false)));
    }

    #[test]
    fn invalid_spec_fails_before_sampling() {
        let bad = vec![ParameterSpec::integer("bb_length", 50, 5)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            sample_parameters(&bad, &mut rng),
            Err(InvalidSpecError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn round_to_zero_decimals() {
        assert_eq!(round_to(42.6, 0), 43.0);
        assert_eq!(round_to(1.25, 1), 1.3);
    }
}
