//! Pulse timing loop.
//!
//! `PulseEmitter` owns the driver and the clock for the lifetime of the motion
//! worker. Each call to [`PulseEmitter::emit`] sets the direction once, then
//! emits up to `count` pulses at a fixed half-period, consulting an
//! [`Interlock`] at every pulse boundary. Sleep overshoot accumulates; no drift
//! compensation is attempted.

use std::cell::Cell;
use std::time::Duration;

use pump_traits::{Clock, Direction, StepperDriver};

use crate::error::PumpError;
use crate::hw_error::map_hw_error;
use crate::state::{RunId, SharedState};
use crate::util::{MIN_STEPS_PER_SEC, floor_rate, half_period};

/// Pause/cancel gate consulted between pulses.
pub trait Interlock {
    /// Block while the sequence is paused. Must return once cancelled.
    fn hold_while_paused(&self) {}
    /// Stop before the next pulse when true.
    fn is_cancelled(&self) -> bool {
        false
    }
    /// Called after every emitted pulse with the running total.
    fn on_pulse(&self, _sent: u64) {}
}

/// Gate for sequences that cannot be paused or cancelled once started.
#[derive(Debug, Default)]
pub struct Uninterruptible {
    sent: Cell<u64>,
}

impl Uninterruptible {
    pub fn sent(&self) -> u64 {
        self.sent.get()
    }
}

impl Interlock for Uninterruptible {
    fn on_pulse(&self, sent: u64) {
        self.sent.set(sent);
    }
}

/// Gate bound to one infusion run in the shared state.
///
/// Publishes `steps_done` after every pulse and treats a superseded run as cancelled.
#[derive(Debug)]
pub struct RunInterlock<'a> {
    state: &'a SharedState,
    run: RunId,
    tick: Duration,
    sent: Cell<u64>,
}

impl<'a> RunInterlock<'a> {
    pub fn new(state: &'a SharedState, run: RunId, tick: Duration) -> Self {
        Self {
            state,
            run,
            tick,
            sent: Cell::new(0),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    /// Pulses emitted so far under this gate.
    pub fn sent(&self) -> u64 {
        self.sent.get()
    }
}

impl Interlock for RunInterlock<'_> {
    fn hold_while_paused(&self) {
        self.state.wait_while_paused(self.run, self.tick);
    }

    fn is_cancelled(&self) -> bool {
        self.state.should_stop(self.run)
    }

    fn on_pulse(&self, sent: u64) {
        self.sent.set(sent);
        self.state.record_progress(self.run, sent);
    }
}

/// A driver error raised part-way through a pulse sequence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error} after {sent} pulses")]
pub struct EmitFault {
    /// Pulses completed before the fault.
    pub sent: u64,
    pub error: PumpError,
}

pub struct PulseEmitter<D, C> {
    driver: D,
    clock: C,
    min_sps: f64,
}

impl<D: StepperDriver, C: Clock> PulseEmitter<D, C> {
    pub fn new(driver: D, clock: C) -> Self {
        Self {
            driver,
            clock,
            min_sps: MIN_STEPS_PER_SEC,
        }
    }

    /// Override the rate floor. Non-positive or non-finite floors are ignored.
    #[must_use]
    pub fn with_min_sps(mut self, min_sps: f64) -> Self {
        if min_sps.is_finite() && min_sps > 0.0 {
            self.min_sps = min_sps;
        }
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn enable(&mut self) -> Result<(), PumpError> {
        self.driver.enable().map_err(|e| map_hw_error(&*e))
    }

    /// Best-effort: failures are logged and swallowed.
    pub fn disable(&mut self) {
        if let Err(e) = self.driver.disable() {
            tracing::warn!(error = %e, "driver disable failed");
        }
    }

    /// Emit up to `count` pulses in `dir` at `steps_per_sec`.
    ///
    /// Returns the number of pulses actually emitted, which is less than
    /// `count` only when the interlock cancelled the sequence.
    pub fn emit(
        &mut self,
        count: u64,
        dir: Direction,
        steps_per_sec: f64,
        gate: &dyn Interlock,
    ) -> Result<u64, EmitFault> {
        self.driver.set_direction(dir).map_err(|e| EmitFault {
            sent: 0,
            error: map_hw_error(&*e),
        })?;
        let half = half_period(floor_rate(steps_per_sec, self.min_sps));
        tracing::trace!(count, ?dir, ?half, "pulse sequence");

        let mut sent = 0u64;
        while sent < count {
            gate.hold_while_paused();
            if gate.is_cancelled() {
                tracing::debug!(sent, count, "pulse sequence cancelled");
                break;
            }
            self.driver
                .emit_pulse(half, &self.clock)
                .map_err(|e| EmitFault {
                    sent,
                    error: map_hw_error(&*e),
                })?;
            sent += 1;
            gate.on_pulse(sent);
        }
        Ok(sent)
    }
}

impl<D, C> std::fmt::Debug for PulseEmitter<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseEmitter")
            .field("min_sps", &self.min_sps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_hardware::SimulatedDriver;
    use pump_traits::clock::test_clock::TestClock;

    struct CancelAfter {
        limit: u64,
        sent: Cell<u64>,
    }

    impl Interlock for CancelAfter {
        fn is_cancelled(&self) -> bool {
            self.sent.get() >= self.limit
        }
        fn on_pulse(&self, sent: u64) {
            self.sent.set(sent);
        }
    }

    #[test]
    fn emits_full_count_at_the_requested_rate() {
        let clock = TestClock::new();
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, clock.clone());
        em.enable().unwrap();
        let gate = Uninterruptible::default();
        let sent = em.emit(100, Direction::Forward, 500.0, &gate).unwrap();
        assert_eq!(sent, 100);
        assert_eq!(gate.sent(), 100);
        assert_eq!(probe.forward_pulses(), 100);
        // 100 pulses at 2 ms each
        assert!((clock.slept().as_secs_f64() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn cancel_stops_before_the_next_pulse() {
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        em.enable().unwrap();
        let gate = CancelAfter {
            limit: 7,
            sent: Cell::new(0),
        };
        assert_eq!(em.emit(50, Direction::Forward, 1000.0, &gate).unwrap(), 7);
        assert_eq!(probe.forward_pulses(), 7);
    }

    #[test]
    fn non_positive_rate_uses_the_floor() {
        let clock = TestClock::new();
        let mut em = PulseEmitter::new(SimulatedDriver::new(), clock.clone()).with_min_sps(10.0);
        em.enable().unwrap();
        em.emit(1, Direction::Reverse, 0.0, &Uninterruptible::default())
            .unwrap();
        assert!((clock.slept().as_secs_f64() - 0.1).abs() < 1e-9);
        assert_eq!(em.driver().direction(), Direction::Reverse);
    }

    #[test]
    fn driver_fault_reports_pulses_already_sent() {
        let mut em = PulseEmitter::new(SimulatedDriver::new(), TestClock::new());
        // never enabled: the simulated driver refuses to pulse
        let fault = em
            .emit(5, Direction::Forward, 100.0, &Uninterruptible::default())
            .expect_err("disabled driver must fault");
        assert_eq!(fault.sent, 0);
        assert!(matches!(fault.error, PumpError::HardwareFault(_)));
    }

    #[test]
    fn zero_count_emits_nothing() {
        let drv = SimulatedDriver::new();
        let probe = drv.probe();
        let mut em = PulseEmitter::new(drv, TestClock::new());
        assert_eq!(
            em.emit(0, Direction::Forward, 100.0, &Uninterruptible::default())
                .unwrap(),
            0
        );
        assert_eq!(probe.forward_pulses(), 0);
    }
}
