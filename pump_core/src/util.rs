//! Rate and period helpers for pulse timing.

use std::time::Duration;

/// Numerical floor for step rates. Not a mechanical limit: it only keeps the
/// period finite when a computed rate is zero or negative.
pub const MIN_STEPS_PER_SEC: f64 = 0.0001;
/// Re-check interval while an infusion is paused.
pub const PAUSE_POLL: Duration = Duration::from_millis(50);
/// Number of seconds in one hour.
pub const SECS_PER_HOUR: f64 = 3600.0;

/// Substitute `floor` for rates that are non-positive or not finite.
/// Slow positive rates are kept as computed.
#[inline]
pub fn floor_rate(steps_per_sec: f64, floor: f64) -> f64 {
    if steps_per_sec.is_finite() && steps_per_sec > 0.0 {
        steps_per_sec
    } else {
        floor
    }
}

/// Half of one step period, `1 / (2 * rate)`. Saturates at `Duration::MAX`
/// for rates so small the period is not representable.
#[inline]
pub fn half_period(steps_per_sec: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / (2.0 * steps_per_sec)).unwrap_or(Duration::MAX)
}

/// Convert a flow in mL/h to a pulse rate for the given calibration.
#[inline]
pub fn flow_to_steps_per_sec(flow_ml_per_hour: f64, steps_per_ml: f64) -> f64 {
    (flow_ml_per_hour / SECS_PER_HOUR) * steps_per_ml
}
