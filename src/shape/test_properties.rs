//! Property-based tests for wave shape invariants.
//!
//! Uses `proptest` to verify that arbitrary valid schedules keep the
//! target curve inside its contract: bounded targets, constant spawn
//! rate, monotone ramps, and a terminal region that starts exactly at
//! the total duration.

use std::time::Duration;

use proptest::prelude::*;

use crate::shape::schedule::{WavePhase, WaveSchedule};
use crate::shape::wave::{LoadShape, ShapeTick, WaveShape};

// ──────────────────── strategies ────────────────────

/// Phase durations are either exactly zero (skipped phase) or at least a
/// millisecond, so nanosecond clock quantization can never straddle a
/// phase boundary.
fn arb_phase_seconds() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.001f64..600.0]
}

fn arb_schedule() -> impl Strategy<Value = WaveSchedule> {
    (
        0u32..=1_000,
        arb_phase_seconds(),
        arb_phase_seconds(),
        arb_phase_seconds(),
        0.1f64..50.0,
    )
        .prop_map(|(max_users, up, hold, down, rate)| WaveSchedule {
            max_users,
            ramp_up_seconds: up,
            hold_seconds: hold,
            ramp_down_seconds: down,
            spawn_rate: rate,
        })
}

fn secs(t: f64) -> Duration {
    Duration::from_secs_f64(t)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every schedule the strategy produces passes construction.
    #[test]
    fn generated_schedules_always_validate(schedule in arb_schedule()) {
        prop_assert!(WaveShape::new(schedule).is_ok());
    }

    /// Active targets never leave [0, max_users], at any elapsed time.
    #[test]
    fn targets_are_always_bounded(
        schedule in arb_schedule(),
        frac in 0.0f64..4.0
    ) {
        let shape = WaveShape::new(schedule).unwrap();
        let t = schedule.total_seconds() * frac;
        if let ShapeTick::Active { target_users, spawn_rate } = shape.tick(secs(t)) {
            prop_assert!(target_users <= schedule.max_users);
            prop_assert_eq!(spawn_rate.to_bits(), schedule.spawn_rate.to_bits());
        }
    }

    /// Anywhere strictly inside the wave the tick is active.
    #[test]
    fn inside_the_wave_is_active(
        schedule in arb_schedule(),
        frac in 0.0f64..0.95
    ) {
        prop_assume!(schedule.total_seconds() > 0.0);
        let shape = WaveShape::new(schedule).unwrap();
        let t = schedule.total_seconds() * frac;
        prop_assert!(
            !shape.tick(secs(t)).is_terminal(),
            "terminal inside the wave at t={} of {}", t, schedule.total_seconds()
        );
    }

    /// At and past the total duration the tick is terminal.
    #[test]
    fn past_the_wave_is_terminal(
        schedule in arb_schedule(),
        frac in 1.001f64..3.0
    ) {
        let shape = WaveShape::new(schedule).unwrap();
        let t = schedule.total_seconds().max(0.001) * frac;
        prop_assert!(shape.tick(secs(t)).is_terminal());
        prop_assert_eq!(shape.phase_at(secs(t)), WavePhase::Done);
    }

    /// Climbing the ramp never lowers the target.
    #[test]
    fn ramp_up_targets_are_monotone(
        schedule in arb_schedule(),
        frac_a in 0.0f64..0.95,
        frac_b in 0.0f64..0.95
    ) {
        prop_assume!(schedule.ramp_up_seconds > 0.0);
        let shape = WaveShape::new(schedule).unwrap();
        let (lo, hi) = if frac_a <= frac_b { (frac_a, frac_b) } else { (frac_b, frac_a) };

        let early = shape.tick(secs(schedule.ramp_up_seconds * lo)).target_users();
        let late = shape.tick(secs(schedule.ramp_up_seconds * hi)).target_users();
        prop_assert!(early <= late, "ramp-up fell: {:?} then {:?}", early, late);
    }

    /// Descending the ramp never raises the target. Fractions start a
    /// hair after the boundary so clock quantization cannot pull a
    /// sample back into the hold.
    #[test]
    fn ramp_down_targets_are_monotone(
        schedule in arb_schedule(),
        frac_a in 0.001f64..0.95,
        frac_b in 0.001f64..0.95
    ) {
        prop_assume!(schedule.ramp_down_seconds > 0.0);
        let shape = WaveShape::new(schedule).unwrap();
        let start = schedule.ramp_down_start_seconds();
        let (lo, hi) = if frac_a <= frac_b { (frac_a, frac_b) } else { (frac_b, frac_a) };

        let early = shape
            .tick(secs(start + schedule.ramp_down_seconds * lo))
            .target_users();
        let late = shape
            .tick(secs(start + schedule.ramp_down_seconds * hi))
            .target_users();
        prop_assert!(early >= late, "ramp-down rose: {:?} then {:?}", early, late);
    }

    /// Repeated evaluation at the same instant answers the same.
    #[test]
    fn tick_is_pure(schedule in arb_schedule(), frac in 0.0f64..2.0) {
        let shape = WaveShape::new(schedule).unwrap();
        let t = secs(schedule.total_seconds() * frac);
        prop_assert_eq!(shape.tick(t), shape.tick(t));
    }

    /// Negative durations are always refused at construction.
    #[test]
    fn negative_durations_never_validate(
        schedule in arb_schedule(),
        bad in -600.0f64..-0.001,
        slot in 0usize..3
    ) {
        let mut broken = schedule;
        match slot {
            0 => broken.ramp_up_seconds = bad,
            1 => broken.hold_seconds = bad,
            _ => broken.ramp_down_seconds = bad,
        }
        let err = WaveShape::new(broken).unwrap_err();
        prop_assert_eq!(err.code(), "WLS-1001");
    }

    /// Non-positive spawn rates are always refused at construction.
    #[test]
    fn non_positive_rates_never_validate(
        schedule in arb_schedule(),
        bad in -50.0f64..=0.0
    ) {
        let mut broken = schedule;
        broken.spawn_rate = bad;
        let err = WaveShape::new(broken).unwrap_err();
        prop_assert_eq!(err.code(), "WLS-1001");
    }
}
