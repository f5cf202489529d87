//! Infusion and retraction sequences.
//!
//! Both workers wrap their pulse loop in a drop guard that restores the shared
//! state to a terminal value and settles the driver on every exit path,
//! including driver faults and unwinding.

use std::time::Duration;

use pump_traits::{Clock, Direction, StepperDriver};

use crate::emitter::{PulseEmitter, RunInterlock, Uninterruptible};
use crate::error::PumpError;
use crate::plan::InfusionPlan;
use crate::state::{RunId, SharedState};

/// How a pulse sequence ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEnd {
    Completed,
    Cancelled,
    Faulted(PumpError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfusionReport {
    pub run: RunId,
    pub total_steps: u64,
    pub steps_sent: u64,
    pub end: RunEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetractionReport {
    /// History at the start of the retraction.
    pub requested_steps: u64,
    pub steps_retracted: u64,
    pub end: RunEnd,
}

struct InfusionGuard<'a, 'g, D: StepperDriver, C: Clock> {
    state: &'a SharedState,
    emitter: &'a mut PulseEmitter<D, C>,
    gate: &'g RunInterlock<'a>,
    hold_torque: bool,
}

impl<D: StepperDriver, C: Clock> Drop for InfusionGuard<'_, '_, D, C> {
    fn drop(&mut self) {
        if !self.hold_torque {
            self.emitter.disable();
        }
        self.state
            .finish_infusion(self.gate.run(), self.gate.sent());
    }
}

/// Run one admitted infusion to completion, cancellation or fault.
///
/// The driver stays enabled after a natural completion with at least one
/// pulse (holding torque on the plunger); every other exit disables it.
pub fn run_infusion<D: StepperDriver, C: Clock>(
    state: &SharedState,
    emitter: &mut PulseEmitter<D, C>,
    plan: &InfusionPlan,
    run: RunId,
    pause_tick: Duration,
) -> InfusionReport {
    let gate = RunInterlock::new(state, run, pause_tick);
    let mut guard = InfusionGuard {
        state,
        emitter,
        gate: &gate,
        hold_torque: false,
    };
    let total = plan.total_steps;
    let report = |sent, end| InfusionReport {
        run,
        total_steps: total,
        steps_sent: sent,
        end,
    };

    if total == 0 {
        tracing::info!(run, "nothing to deliver");
        return report(0, RunEnd::Completed);
    }
    if state.should_stop(run) {
        return report(0, RunEnd::Cancelled);
    }
    if let Err(e) = guard.emitter.enable() {
        tracing::error!(run, error = %e, "driver enable failed");
        state.record_fault(e.clone());
        return report(0, RunEnd::Faulted(e));
    }

    tracing::info!(
        run,
        total_steps = total,
        sps = plan.steps_per_second,
        "infusion started"
    );
    match guard
        .emitter
        .emit(total, Direction::Forward, plan.steps_per_second, &gate)
    {
        Ok(sent) if sent == total => {
            guard.hold_torque = true;
            tracing::info!(run, sent, "infusion completed");
            report(sent, RunEnd::Completed)
        }
        Ok(sent) => {
            tracing::info!(run, sent, total_steps = total, "infusion cancelled");
            report(sent, RunEnd::Cancelled)
        }
        Err(fault) => {
            tracing::error!(run, sent = fault.sent, error = %fault.error, "infusion faulted");
            state.record_fault(fault.error.clone());
            report(fault.sent, RunEnd::Faulted(fault.error))
        }
    }
}

struct RetractionGuard<'a, 'g, D: StepperDriver, C: Clock> {
    state: &'a SharedState,
    emitter: &'a mut PulseEmitter<D, C>,
    gate: &'g Uninterruptible,
}

impl<D: StepperDriver, C: Clock> Drop for RetractionGuard<'_, '_, D, C> {
    fn drop(&mut self) {
        self.emitter.disable();
        self.state.finish_retraction(self.gate.sent());
    }
}

/// Pull the plunger back by the most recently delivered step count.
///
/// Runs to completion once started; pause and cancel do not apply. The driver
/// is disabled on every exit, and history is reduced by what was retracted.
pub fn run_retraction<D: StepperDriver, C: Clock>(
    state: &SharedState,
    emitter: &mut PulseEmitter<D, C>,
    retract_sps: f64,
) -> RetractionReport {
    let requested = state.delivered_steps();
    let gate = Uninterruptible::default();
    let mut guard = RetractionGuard {
        state,
        emitter,
        gate: &gate,
    };
    let report = |retracted, end| RetractionReport {
        requested_steps: requested,
        steps_retracted: retracted,
        end,
    };

    if requested == 0 {
        tracing::info!("no delivered steps to retract");
        return report(0, RunEnd::Completed);
    }
    if let Err(e) = guard.emitter.enable() {
        tracing::error!(error = %e, "driver enable failed");
        state.record_fault(e.clone());
        return report(0, RunEnd::Faulted(e));
    }

    tracing::info!(steps = requested, sps = retract_sps, "retraction started");
    match guard
        .emitter
        .emit(requested, Direction::Reverse, retract_sps, &gate)
    {
        Ok(n) => {
            tracing::info!(steps = n, "retraction completed");
            report(n, RunEnd::Completed)
        }
        Err(fault) => {
            tracing::error!(retracted = fault.sent, error = %fault.error, "retraction faulted");
            state.record_fault(fault.error.clone());
            report(fault.sent, RunEnd::Faulted(fault.error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationModel;
    use crate::plan::InfusionRequest;
    use crate::util::{MIN_STEPS_PER_SEC, PAUSE_POLL};
    use pump_hardware::SimulatedDriver;
    use pump_traits::clock::test_clock::TestClock;

    fn plan(volume_ml: f64) -> InfusionPlan {
        let req = InfusionRequest::new(3600.0, volume_ml, 10).unwrap();
        InfusionPlan::compute(&req, &CalibrationModel::default(), MIN_STEPS_PER_SEC).unwrap()
    }

    #[test]
    fn completed_run_records_history_and_keeps_driver_enabled() {
        let state = SharedState::new();
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        let p = plan(0.1);
        let run = state.begin_infusion(&p).unwrap();
        let rep = run_infusion(&state, &mut em, &p, run, PAUSE_POLL);

        assert_eq!(rep.end, RunEnd::Completed);
        assert_eq!(rep.steps_sent, p.total_steps);
        let s = state.snapshot();
        assert!(!s.running && !s.paused);
        assert_eq!(s.steps_done, p.total_steps);
        assert_eq!(s.delivered_steps, p.total_steps);
        assert_eq!(s.pending_jobs, 0);
        assert!(probe.is_enabled());
    }

    #[test]
    fn run_cancelled_before_first_pulse_disables_driver() {
        let state = SharedState::new();
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        let p = plan(1.0);
        let run = state.begin_infusion(&p).unwrap();
        state.cancel();
        let rep = run_infusion(&state, &mut em, &p, run, PAUSE_POLL);

        assert_eq!(rep.end, RunEnd::Cancelled);
        assert_eq!(rep.steps_sent, 0);
        assert_eq!(probe.forward_pulses(), 0);
        assert!(!probe.is_enabled());
        assert_eq!(probe.disable_count(), 1);
        assert_eq!(state.delivered_steps(), 0);
    }

    #[test]
    fn enable_failure_still_clears_running() {
        struct DeadDriver;
        impl StepperDriver for DeadDriver {
            fn enable(&mut self) -> pump_traits::DriverResult {
                Err("gpio chip missing".into())
            }
            fn disable(&mut self) -> pump_traits::DriverResult {
                Err("gpio chip missing".into())
            }
            fn set_direction(&mut self, _d: Direction) -> pump_traits::DriverResult {
                Ok(())
            }
            fn set_step(&mut self, _h: bool) -> pump_traits::DriverResult {
                Ok(())
            }
        }
        let state = SharedState::new();
        let mut em = PulseEmitter::new(DeadDriver, TestClock::new());
        let p = plan(1.0);
        let run = state.begin_infusion(&p).unwrap();
        let rep = run_infusion(&state, &mut em, &p, run, PAUSE_POLL);
        assert!(matches!(rep.end, RunEnd::Faulted(PumpError::HardwareFault(_))));
        let s = state.snapshot();
        assert!(!s.running);
        assert!(matches!(s.last_fault, Some(PumpError::HardwareFault(_))));
    }

    #[test]
    fn retraction_reverses_history_and_disables() {
        let state = SharedState::new();
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        let p = plan(0.05);
        let run = state.begin_infusion(&p).unwrap();
        run_infusion(&state, &mut em, &p, run, PAUSE_POLL);

        state.begin_retraction().unwrap();
        let rep = run_retraction(&state, &mut em, 400.0);
        assert_eq!(rep.end, RunEnd::Completed);
        assert_eq!(rep.steps_retracted, p.total_steps);
        assert_eq!(probe.reverse_pulses(), p.total_steps);
        assert_eq!(probe.net_steps(), 0);
        assert_eq!(state.delivered_steps(), 0);
        assert!(!probe.is_enabled());
        assert!(!state.snapshot().retracting);
    }

    #[test]
    fn empty_history_retraction_only_disables() {
        let state = SharedState::new();
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        state.begin_retraction().unwrap();
        let rep = run_retraction(&state, &mut em, 400.0);
        assert_eq!(rep.steps_retracted, 0);
        assert_eq!(probe.enable_count(), 0);
        assert_eq!(probe.disable_count(), 1);
        assert_eq!(state.snapshot().pending_jobs, 0);
    }
}
