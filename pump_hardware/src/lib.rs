pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod tb6600;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use tb6600::{Tb6600, Tb6600Pins};

use pump_traits::{Clock, Direction, DriverResult, StepperDriver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared between a `SimulatedDriver` and whoever observes it.
#[derive(Debug, Default)]
pub struct SimProbe {
    forward: AtomicU64,
    reverse: AtomicU64,
    enables: AtomicU64,
    disables: AtomicU64,
    enabled: AtomicBool,
}

impl SimProbe {
    pub fn forward_pulses(&self) -> u64 {
        self.forward.load(Ordering::Relaxed)
    }

    pub fn reverse_pulses(&self) -> u64 {
        self.reverse.load(Ordering::Relaxed)
    }

    /// Net plunger travel in steps (forward minus reverse).
    pub fn net_steps(&self) -> i64 {
        let fwd = i64::try_from(self.forward_pulses()).unwrap_or(i64::MAX);
        let rev = i64::try_from(self.reverse_pulses()).unwrap_or(i64::MAX);
        fwd.saturating_sub(rev)
    }

    pub fn enable_count(&self) -> u64 {
        self.enables.load(Ordering::Relaxed)
    }

    pub fn disable_count(&self) -> u64 {
        self.disables.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// Driver used when no physical hardware is present.
///
/// Performs no I/O but keeps the pulse timing contract: each pulse sleeps the
/// full step period on the supplied clock.
#[derive(Debug)]
pub struct SimulatedDriver {
    probe: Arc<SimProbe>,
    direction: Direction,
    enabled: bool,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(SimProbe::default()),
            direction: Direction::Forward,
            enabled: false,
        }
    }

    /// Shared handle to the pulse/enable counters.
    pub fn probe(&self) -> Arc<SimProbe> {
        Arc::clone(&self.probe)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl StepperDriver for SimulatedDriver {
    fn enable(&mut self) -> DriverResult {
        self.enabled = true;
        self.probe.enabled.store(true, Ordering::Relaxed);
        self.probe.enables.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("driver enabled (simulated)");
        Ok(())
    }

    fn disable(&mut self) -> DriverResult {
        self.enabled = false;
        self.probe.enabled.store(false, Ordering::Relaxed);
        self.probe.disables.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("driver disabled (simulated)");
        Ok(())
    }

    fn set_direction(&mut self, dir: Direction) -> DriverResult {
        self.direction = dir;
        Ok(())
    }

    fn set_step(&mut self, _high: bool) -> DriverResult {
        if !self.enabled {
            return Err(Box::new(HwError::NotEnabled));
        }
        Ok(())
    }

    fn emit_pulse(&mut self, half_period: Duration, clock: &dyn Clock) -> DriverResult {
        if !self.enabled {
            return Err(Box::new(HwError::NotEnabled));
        }
        clock.sleep(half_period.saturating_mul(2));
        let counter = match self.direction {
            Direction::Forward => &self.probe.forward,
            Direction::Reverse => &self.probe.reverse,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
