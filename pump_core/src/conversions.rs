//! Conversions from `pump_config` schema types to engine types.

use std::time::Duration;

use crate::calibration::{CalibrationModel, SyringeProfile};
use crate::config::MotionCfg;
use crate::error::BuildError;

impl From<&pump_config::MotionCfg> for MotionCfg {
    fn from(c: &pump_config::MotionCfg) -> Self {
        Self {
            retract_sps: c.retract_sps,
            min_sps: c.min_sps,
            pause_poll: Duration::from_millis(c.pause_poll_ms),
        }
    }
}

impl From<pump_config::SyringeRow> for SyringeProfile {
    fn from(r: pump_config::SyringeRow) -> Self {
        Self {
            size_ml: r.size_ml,
            base_steps_per_ml: r.steps_per_ml,
        }
    }
}

impl CalibrationModel {
    /// Build from a profile table plus the `[calibration]` section.
    ///
    /// The rows are passed separately so callers decide whether they came
    /// from the inline table or a CSV file.
    pub fn from_rows(
        rows: &[pump_config::SyringeRow],
        cfg: &pump_config::CalibrationCfg,
    ) -> Result<Self, BuildError> {
        Self::new(
            rows.iter().copied().map(SyringeProfile::from),
            cfg.default_syringe_ml,
            cfg.factor,
        )
    }
}

impl TryFrom<&pump_config::CalibrationCfg> for CalibrationModel {
    type Error = BuildError;

    /// Uses the inline syringe table only; load a CSV with `CalibrationCfg::rows` first.
    fn try_from(c: &pump_config::CalibrationCfg) -> Result<Self, Self::Error> {
        Self::from_rows(&c.syringes, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sections_match_engine_defaults() {
        let cfg = pump_config::Config::default();
        let cal = CalibrationModel::try_from(&cfg.calibration).unwrap();
        let reference = CalibrationModel::default();
        for size in [10, 15, 20, 99] {
            assert_eq!(cal.steps_per_ml(size), reference.steps_per_ml(size));
        }
        assert_eq!(MotionCfg::from(&cfg.motion), MotionCfg::default());
    }

    #[test]
    fn default_size_missing_from_rows_is_rejected() {
        let cfg = pump_config::CalibrationCfg {
            default_syringe_ml: 50,
            ..pump_config::CalibrationCfg::default()
        };
        let err = CalibrationModel::try_from(&cfg).expect_err("50 mL not in table");
        assert!(matches!(err, BuildError::UnknownDefaultSyringe(50)));
    }
}
