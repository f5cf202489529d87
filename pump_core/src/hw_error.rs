//! Maps `Box<dyn Error>` from the driver boundary to typed `PumpError`.
//!
//! The traits in `pump_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `pump_hardware::HwError` downcasting.

use crate::error::PumpError;

/// Map a driver-boundary error to a typed `PumpError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PumpError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pump_hardware::HwError>() {
            return match hw {
                pump_hardware::HwError::NotEnabled => {
                    PumpError::HardwareFault("driver not enabled before pulsing".into())
                }
                other => PumpError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("gpio") {
        PumpError::HardwareFault(s)
    } else {
        PumpError::Hardware(s)
    }
}
