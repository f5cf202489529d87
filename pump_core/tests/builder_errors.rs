use std::time::Duration;

use pump_core::error::BuildError;
use pump_core::{InfusionController, MotionCfg};
use pump_hardware::SimulatedDriver;
use rstest::rstest;

#[rstest]
fn builder_missing_driver_yields_typed_build_error() {
    let err = InfusionController::builder()
        // missing with_driver()
        .with_motion(MotionCfg::default())
        .try_build()
        .expect_err("should fail with MissingDriver");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingDriver) => {}
        other => panic!("expected MissingDriver, got: {other:?}"),
    }
}

#[rstest]
#[case::zero_retract(MotionCfg { retract_sps: 0.0, ..MotionCfg::default() })]
#[case::nan_retract(MotionCfg { retract_sps: f64::NAN, ..MotionCfg::default() })]
#[case::negative_floor(MotionCfg { min_sps: -1.0, ..MotionCfg::default() })]
#[case::zero_poll(MotionCfg { pause_poll: Duration::ZERO, ..MotionCfg::default() })]
fn invalid_motion_is_rejected(#[case] motion: MotionCfg) {
    let err = InfusionController::builder()
        .with_driver(SimulatedDriver::new())
        .with_motion(motion)
        .build()
        .expect_err("invalid motion config");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn defaults_build_and_start_idle() {
    let ctl = InfusionController::builder()
        .with_driver(SimulatedDriver::new())
        .build()
        .expect("defaults are valid");
    let st = ctl.status();
    assert!(!st.running && !st.paused && !st.cancelled);
    assert_eq!(ctl.calibration().sizes().collect::<Vec<_>>(), vec![10, 15, 20]);
}
