//! Runtime motion settings for the engine.
//!
//! Separate from the TOML schema in `pump_config`; see `conversions` for the bridge.

use std::time::Duration;

use crate::util::{MIN_STEPS_PER_SEC, PAUSE_POLL};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCfg {
    /// Fixed retraction rate in steps/s, independent of the infusion rate.
    pub retract_sps: f64,
    /// Floor substituted for non-positive or vanishing step rates.
    pub min_sps: f64,
    /// Re-check interval while paused.
    pub pause_poll: Duration,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            retract_sps: 400.0,
            min_sps: MIN_STEPS_PER_SEC,
            pause_poll: PAUSE_POLL,
        }
    }
}
