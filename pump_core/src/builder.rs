//! Type-state builder for `InfusionController`.
//!
//! The builder enforces at compile time that a driver is provided before
//! `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;

use pump_traits::{Clock, MonotonicClock, StepperDriver};

use crate::calibration::CalibrationModel;
use crate::config::MotionCfg;
use crate::controller::InfusionController;
use crate::error::{BuildError, Result};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `InfusionController`. All fields are validated on `build()`.
pub struct ControllerBuilder<D> {
    driver: Option<Box<dyn StepperDriver + Send>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    calibration: Option<CalibrationModel>,
    motion: Option<MotionCfg>,
    _d: PhantomData<D>,
}

impl Default for ControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            driver: None,
            clock: None,
            calibration: None,
            motion: None,
            _d: PhantomData,
        }
    }
}

fn validate_motion(m: &MotionCfg) -> Result<()> {
    if !(m.retract_sps.is_finite() && m.retract_sps > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "retract_sps must be finite and > 0",
        )));
    }
    if !(m.min_sps.is_finite() && m.min_sps > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_sps must be finite and > 0",
        )));
    }
    if m.pause_poll.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "pause poll interval must be > 0",
        )));
    }
    Ok(())
}

impl<D> ControllerBuilder<D> {
    /// Fallible build available in any type-state; returns a typed error for missing pieces.
    pub fn try_build(self) -> Result<InfusionController> {
        let driver = self
            .driver
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDriver))?;
        let motion = self.motion.unwrap_or_default();
        validate_motion(&motion)?;
        let calibration = self.calibration.unwrap_or_default();
        let clock: Box<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Box::new(MonotonicClock::new()),
        };

        let ctl = InfusionController::spawn(driver, clock, calibration, motion)
            .map_err(|e| eyre::eyre!("spawn motion worker: {e}"))?;
        tracing::debug!(?motion, "controller ready");
        Ok(ctl)
    }

    pub fn with_calibration(mut self, calibration: CalibrationModel) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }
}

// Setter that advances type-state
impl ControllerBuilder<Missing> {
    pub fn with_driver(
        self,
        driver: impl StepperDriver + Send + 'static,
    ) -> ControllerBuilder<Set> {
        ControllerBuilder {
            driver: Some(Box::new(driver)),
            clock: self.clock,
            calibration: self.calibration,
            motion: self.motion,
            _d: PhantomData,
        }
    }
}

impl ControllerBuilder<Set> {
    /// Validate and build the controller. Only available once a driver is set.
    pub fn build(self) -> Result<InfusionController> {
        self.try_build()
    }
}
