//! Dosing requests and the motion plan derived from them.

use std::time::Duration;

use crate::calibration::{CalibrationModel, SyringeProfile};
use crate::error::PumpError;
use crate::util::{floor_rate, flow_to_steps_per_sec};

/// A clinical dosing request as received from the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfusionRequest {
    pub flow_rate_ml_per_hour: f64,
    pub volume_ml: f64,
    pub syringe_size_ml: u32,
}

impl InfusionRequest {
    /// Build and validate a request.
    pub fn new(
        flow_rate_ml_per_hour: f64,
        volume_ml: f64,
        syringe_size_ml: u32,
    ) -> Result<Self, PumpError> {
        let req = Self {
            flow_rate_ml_per_hour,
            volume_ml,
            syringe_size_ml,
        };
        req.validate()?;
        Ok(req)
    }

    /// Parse textual fields (e.g. from a request body or console line).
    pub fn parse(flow_rate: &str, volume: &str, syringe_size: &str) -> Result<Self, PumpError> {
        let flow = flow_rate
            .trim()
            .parse::<f64>()
            .map_err(|_| PumpError::InvalidInput(format!("unparseable flow rate {flow_rate:?}")))?;
        let vol = volume
            .trim()
            .parse::<f64>()
            .map_err(|_| PumpError::InvalidInput(format!("unparseable volume {volume:?}")))?;
        let syr = syringe_size.trim().parse::<u32>().map_err(|_| {
            PumpError::InvalidInput(format!("unparseable syringe size {syringe_size:?}"))
        })?;
        Self::new(flow, vol, syr)
    }

    /// Flow and volume must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), PumpError> {
        if !(self.flow_rate_ml_per_hour.is_finite() && self.flow_rate_ml_per_hour > 0.0) {
            return Err(PumpError::InvalidInput(format!(
                "flow rate must be > 0 mL/h, got {}",
                self.flow_rate_ml_per_hour
            )));
        }
        if !(self.volume_ml.is_finite() && self.volume_ml > 0.0) {
            return Err(PumpError::InvalidInput(format!(
                "volume must be > 0 mL, got {}",
                self.volume_ml
            )));
        }
        Ok(())
    }
}

/// Ephemeral motion plan for one infusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfusionPlan {
    pub request: InfusionRequest,
    /// Profile actually used (the default one when the requested size is unknown).
    pub profile: SyringeProfile,
    pub steps_per_ml: f64,
    pub total_steps: u64,
    /// Pulse rate, never below the configured floor.
    pub steps_per_second: f64,
}

impl InfusionPlan {
    /// Derive total steps and pulse rate from a request.
    ///
    /// `total_steps = round(volume * steps_per_ml)`;
    /// `steps_per_second = flow / 3600 * steps_per_ml`; `min_sps` only replaces
    /// a rate that comes out non-positive.
    pub fn compute(
        request: &InfusionRequest,
        calibration: &CalibrationModel,
        min_sps: f64,
    ) -> Result<Self, PumpError> {
        request.validate()?;
        let profile = calibration.resolve(request.syringe_size_ml);
        let steps_per_ml = calibration.steps_per_ml(request.syringe_size_ml);
        // float-to-int `as` saturates, so huge volumes clamp instead of wrapping
        let total_steps = (request.volume_ml * steps_per_ml).round().max(0.0) as u64;
        let steps_per_second = floor_rate(
            flow_to_steps_per_sec(request.flow_rate_ml_per_hour, steps_per_ml),
            min_sps,
        );
        Ok(Self {
            request: *request,
            profile,
            steps_per_ml,
            total_steps,
            steps_per_second,
        })
    }

    /// Nominal run time ignoring pauses and sleep overshoot.
    pub fn nominal_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.total_steps as f64 / self.steps_per_second)
            .unwrap_or(Duration::MAX)
    }
}
