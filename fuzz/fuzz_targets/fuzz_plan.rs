#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use pump_core::{CalibrationModel, InfusionPlan, InfusionRequest, util::MIN_STEPS_PER_SEC};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    flow: &'a str,
    volume: &'a str,
    syringe: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(req) = InfusionRequest::parse(input.flow, input.volume, input.syringe) else {
        return;
    };
    let plan = InfusionPlan::compute(&req, &CalibrationModel::default(), MIN_STEPS_PER_SEC)
        .expect("parsed requests are valid");
    assert!(plan.steps_per_second > 0.0);
    assert!(plan.steps_per_second.is_finite());
    let _ = plan.nominal_duration();
});
