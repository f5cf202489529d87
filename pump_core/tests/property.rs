use proptest::prelude::*;
use pump_core::util::MIN_STEPS_PER_SEC;
use pump_core::{CalibrationModel, Eta, InfusionPlan, InfusionRequest, RunState, StatusReport};

const BASES: [(u32, f64); 3] = [(10, 303.0), (15, 265.0), (20, 168.0)];

proptest! {
    #[test]
    fn total_steps_follow_the_calibration(
        volume in 0.001f64..60.0,
        flow in 0.01f64..2000.0,
        idx in 0usize..3,
    ) {
        let (size, base) = BASES[idx];
        let cal = CalibrationModel::default();
        let req = InfusionRequest::new(flow, volume, size).unwrap();
        let plan = InfusionPlan::compute(&req, &cal, MIN_STEPS_PER_SEC).unwrap();

        let spm = base * 2.5;
        prop_assert_eq!(plan.total_steps, (volume * spm).round() as u64);
        let sps = flow / 3600.0 * spm;
        prop_assert!((plan.steps_per_second - sps).abs() <= 1e-9 * sps.max(1.0));
        prop_assert!(plan.steps_per_second > 0.0);
    }

    #[test]
    fn unknown_sizes_use_the_default_profile(size in 21u32..500, volume in 0.01f64..10.0) {
        let cal = CalibrationModel::default();
        let req = InfusionRequest::new(100.0, volume, size).unwrap();
        let plan = InfusionPlan::compute(&req, &cal, MIN_STEPS_PER_SEC).unwrap();
        prop_assert_eq!(plan.profile.size_ml, 10);
        prop_assert_eq!(plan.total_steps, (volume * 757.5).round() as u64);
    }

    #[test]
    fn status_is_consistent_with_its_snapshot(
        total in 0u64..1_000_000,
        frac in 0.0f64..=1.0,
        sps in prop_oneof![Just(0.0), 0.0001f64..5000.0],
    ) {
        let done = (total as f64 * frac) as u64;
        let snap = RunState {
            running: true,
            total_steps: total,
            steps_done: done.min(total),
            steps_per_second: sps,
            steps_per_ml: 757.5,
            ..RunState::default()
        };
        let r = StatusReport::from(&snap);
        prop_assert!((0.0..=100.0).contains(&r.progress_pct));
        prop_assert_eq!(r.remaining_steps + r.steps_done, total);
        let whole = r.eta_seconds.floor() as u64;
        prop_assert_eq!(r.eta.hours * 3600 + r.eta.minutes * 60 + r.eta.seconds, whole);
        prop_assert!(r.eta.minutes < 60 && r.eta.seconds < 60);
    }

    #[test]
    fn eta_components_recompose(secs in 0u64..10_000_000) {
        let e = Eta::from_secs_f64(secs as f64);
        prop_assert_eq!(e.hours * 3600 + e.minutes * 60 + e.seconds, secs);
    }
}
