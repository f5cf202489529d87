//! Operator-facing status derived from a run-state snapshot.

use crate::error::PumpError;
use crate::state::RunState;

/// Remaining time split into whole hours, minutes and seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eta {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Eta {
    /// Split a (floored) number of seconds. Negative and non-finite inputs give zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        let whole = if secs.is_finite() && secs > 0.0 {
            // saturating cast
            secs.floor() as u64
        } else {
            0
        };
        Self {
            hours: whole / 3600,
            minutes: (whole % 3600) / 60,
            seconds: whole % 60,
        }
    }
}

impl std::fmt::Display for Eta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub running: bool,
    pub paused: bool,
    pub cancelled: bool,
    pub retracting: bool,
    pub steps_done: u64,
    pub total_steps: u64,
    pub remaining_steps: u64,
    pub progress_pct: f64,
    pub eta_seconds: f64,
    pub eta: Eta,
    pub delivered_ml: f64,
    pub steps_per_second: f64,
    pub syringe_size_ml: u32,
    pub last_fault: Option<PumpError>,
}

impl From<&RunState> for StatusReport {
    fn from(s: &RunState) -> Self {
        let progress_pct = if s.total_steps > 0 {
            s.steps_done as f64 / s.total_steps as f64 * 100.0
        } else {
            0.0
        };
        let remaining_steps = s.total_steps.saturating_sub(s.steps_done);
        let eta_seconds = if s.steps_per_second > 0.0 {
            remaining_steps as f64 / s.steps_per_second
        } else {
            0.0
        };
        let delivered_ml = if s.steps_per_ml > 0.0 {
            s.steps_done as f64 / s.steps_per_ml
        } else {
            0.0
        };
        Self {
            running: s.running,
            paused: s.paused,
            cancelled: s.cancelled,
            retracting: s.retracting,
            steps_done: s.steps_done,
            total_steps: s.total_steps,
            remaining_steps,
            progress_pct,
            eta_seconds,
            eta: Eta::from_secs_f64(eta_seconds),
            delivered_ml,
            steps_per_second: s.steps_per_second,
            syringe_size_ml: s.syringe_size_ml,
            last_fault: s.last_fault.clone(),
        }
    }
}

impl From<RunState> for StatusReport {
    fn from(s: RunState) -> Self {
        Self::from(&s)
    }
}
