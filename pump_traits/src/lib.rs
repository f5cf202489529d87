pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Result type used across the driver boundary.
pub type DriverResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Plunger travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Push the plunger (dispense).
    Forward,
    /// Pull the plunger back (retract).
    Reverse,
}

impl Direction {
    /// The opposite travel direction.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Step/direction/enable interface of an open-loop stepper driver (TB6600 class).
///
/// `disable()` is called on every terminal path and callers treat its failure
/// as best-effort; implementations should still report errors rather than panic.
pub trait StepperDriver {
    /// Energize the motor coils.
    fn enable(&mut self) -> DriverResult;
    /// De-energize the motor coils.
    fn disable(&mut self) -> DriverResult;
    fn set_direction(&mut self, dir: Direction) -> DriverResult;
    /// Drive the STEP line to the given level.
    fn set_step(&mut self, high: bool) -> DriverResult;

    /// Emit one step pulse: STEP high for `half_period`, then low for `half_period`.
    ///
    /// Implementations without physical signals may override this to sleep the
    /// full period; the timing contract must stay the same.
    fn emit_pulse(&mut self, half_period: Duration, clock: &dyn Clock) -> DriverResult {
        self.set_step(true)?;
        clock.sleep(half_period);
        self.set_step(false)?;
        clock.sleep(half_period);
        Ok(())
    }
}

impl<D: StepperDriver + ?Sized> StepperDriver for Box<D> {
    fn enable(&mut self) -> DriverResult {
        (**self).enable()
    }
    fn disable(&mut self) -> DriverResult {
        (**self).disable()
    }
    fn set_direction(&mut self, dir: Direction) -> DriverResult {
        (**self).set_direction(dir)
    }
    fn set_step(&mut self, high: bool) -> DriverResult {
        (**self).set_step(high)
    }
    fn emit_pulse(&mut self, half_period: Duration, clock: &dyn Clock) -> DriverResult {
        (**self).emit_pulse(half_period, clock)
    }
}
