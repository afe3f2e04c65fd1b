//! Property tests for sampling, repair, and window invariants.
//!
//! Uses proptest to verify:
//! 1. Bounds: every sampled and every repaired value lies within its declared range
//! 2. Ordering: fast ≤ slow for every paired lookback after repair
//! 3. Enable flags: trade_longs and trade_shorts are never both off
//! 4. Allocation: three-tier exit quantities leave room for the last exit
//! 5. Idempotence: repairing a repaired set changes nothing
//! 6. Separation: windows of one pass start at least the minimum separation apart

use chrono::{Duration, TimeZone, Utc};
use freedomfinder_core::constraints::risk_reward::in_band;
use freedomfinder_core::params::{round_to, ParamKind, ParamValue};
use freedomfinder_core::{DataRange, ParameterSet, PolicyRegistry, Pool, WindowSampler};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Helpers ──────────────────────────────────────────────────────────

fn sample_and_repair(
    registry: &PolicyRegistry,
    strategy: &str,
    seed: u64,
    candles: u64,
) -> (ParameterSet, freedomfinder_core::RepairReport) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = registry.sample(strategy, &mut rng).unwrap();
    let report = registry
        .repair(strategy, &mut params, candles, &mut rng)
        .unwrap();
    (params, report)
}

fn arb_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("guppy"),
        Just("ichimoku"),
        Just("obv"),
        Just("sup_res"),
        Just("mfi"),
    ]
}

fn arb_candles() -> impl Strategy<Value = u64> {
    prop_oneof![4u64..60, 60u64..400, 400u64..5000]
}

// ── 1. Bounds ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn repaired_values_stay_in_bounds(
        strategy in arb_strategy(),
        seed in any::<u64>(),
        candles in arb_candles(),
    ) {
        let registry = PolicyRegistry::with_builtin();
        let specs = registry.specs(strategy).unwrap();
        let (params, _) = sample_and_repair(&registry, strategy, seed, candles);

        prop_assert_eq!(params.len(), specs.len());
        for spec in &specs {
            let value = params.get(&spec.name).unwrap();
            prop_assert!(spec.contains(value), "{}.{} = {} out of bounds", strategy, spec.name, value);
            if let (ParamKind::Real { decimals, .. }, ParamValue::Real(v)) = (&spec.kind, value) {
                prop_assert_eq!(*v, round_to(*v, *decimals));
            }
        }
    }
}

// ── 2-4. Guppy constraints ───────────────────────────────────────────

proptest! {
    #[test]
    fn guppy_fast_never_exceeds_slow(seed in any::<u64>(), candles in arb_candles()) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        prop_assert!(params.int("macd_fast").unwrap() <= params.int("macd_slow").unwrap());
        prop_assert!(params.int("wae_fast_length").unwrap() <= params.int("wae_slow_length").unwrap());
    }

    #[test]
    fn guppy_lookbacks_fit_the_window(seed in any::<u64>(), candles in 4u64..120) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        for (name, value) in params.iter() {
            if let ParamValue::Int(v) = value {
                if name.ends_with("_length") || name.ends_with("_period") || name.starts_with("macd_")
                    || name.starts_with("adx_")
                {
                    prop_assert!((*v as u64) < candles, "{} = {} with {} candles", name, v, candles);
                }
            }
        }
    }

    #[test]
    fn guppy_never_disables_both_sides(seed in any::<u64>(), candles in arb_candles()) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        prop_assert!(params.flag("trade_longs").unwrap() || params.flag("trade_shorts").unwrap());
    }

    #[test]
    fn guppy_ladders_are_monotone(seed in any::<u64>(), candles in arb_candles()) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        for side in [["ltp1", "ltp2", "ltp3"], ["stp1", "stp2", "stp3"]] {
            let l: Vec<f64> = side.iter().map(|n| params.real(n).unwrap()).collect();
            prop_assert!(l[0] <= l[1] && l[1] <= l[2], "ladder {:?}", l);
        }
    }

    #[test]
    fn guppy_three_tier_quantities_fit(seed in any::<u64>(), candles in arb_candles()) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        for (tiers, first, second) in [
            ("tp_long", "ltp1_qty", "ltp2_qty"),
            ("tp_short", "stp1_qty", "stp2_qty"),
        ] {
            if params.int(tiers).unwrap() == 3 {
                prop_assert!(params.real(first).unwrap() + params.real(second).unwrap() <= 100.0);
            }
        }
    }

    #[test]
    fn guppy_short_windows_drop_ema200(seed in any::<u64>(), candles in 4u64..=200) {
        let registry = PolicyRegistry::with_builtin();
        let (params, _) = sample_and_repair(&registry, "guppy", seed, candles);
        prop_assert!(!params.flag("ema200_long").unwrap());
        prop_assert!(!params.flag("ema200_short").unwrap());
    }
}

// ── 5. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn repair_is_a_projection(
        strategy in arb_strategy(),
        seed in any::<u64>(),
        second_seed in any::<u64>(),
        candles in arb_candles(),
    ) {
        let registry = PolicyRegistry::with_builtin();
        let (params, report) = sample_and_repair(&registry, strategy, seed, candles);
        // A calibration that hit its cap may legitimately be re-drawn.
        let calibrated = report.calibration.map_or(true, |c| c.in_band);

        let mut again = params.clone();
        let mut rng = StdRng::seed_from_u64(second_seed);
        let second = registry.repair(strategy, &mut again, candles, &mut rng).unwrap();

        if calibrated {
            prop_assert_eq!(&again, &params);
            if let Some(cal) = second.calibration {
                prop_assert!(in_band(cal.rr_long) && in_band(cal.rr_short));
                prop_assert_eq!(cal.iterations, 1);
            }
        }
    }
}

// ── 6. Separation ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn separated_windows_keep_their_distance(
        seed in any::<u64>(),
        days in 1i64..30,
        sep_hours in 1i64..72,
        count in 1usize..60,
        recent in any::<bool>(),
    ) {
        let range = DataRange::new(
            Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let pool = if recent { Pool::Recent } else { Pool::Full };
        let sampler = WindowSampler::new(pool, Duration::days(days), range, Duration::hours(1)).unwrap();
        let sep = Duration::hours(sep_hours);
        prop_assume!(count as u64 <= sampler.guaranteed_separated_starts(sep));

        let mut rng = StdRng::seed_from_u64(seed);
        let mut starts = Vec::new();
        for _ in 0..count {
            let w = sampler.sample_non_overlapping(&starts, sep, 100_000, &mut rng).unwrap();
            prop_assert_eq!(w.duration(), Duration::days(days));
            starts.push(w.start);
        }
        for i in 0..starts.len() {
            for j in (i + 1)..starts.len() {
                prop_assert!((starts[i] - starts[j]).num_seconds().abs() >= sep.num_seconds());
            }
        }
    }
}
