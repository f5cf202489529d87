//! Syringe calibration: physical volume to motor steps.
//!
//! `steps_per_ml(size) = base_steps_per_ml(size) * factor`, where unknown
//! sizes resolve to the default profile. The factor corrects measured delivery
//! error for every syringe at once and is fixed for the life of the model.

use std::collections::BTreeMap;

use crate::error::BuildError;

/// Measured base rate for one nominal syringe size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyringeProfile {
    pub size_ml: u32,
    pub base_steps_per_ml: f64,
}

#[derive(Debug, Clone)]
pub struct CalibrationModel {
    profiles: BTreeMap<u32, SyringeProfile>,
    default: SyringeProfile,
    factor: f64,
}

impl CalibrationModel {
    /// Build a model from a profile table.
    ///
    /// Fails when the factor or any base rate is not a finite positive value,
    /// or when `default_size_ml` is not in the table.
    pub fn new(
        profiles: impl IntoIterator<Item = SyringeProfile>,
        default_size_ml: u32,
        factor: f64,
    ) -> Result<Self, BuildError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(BuildError::InvalidConfig(
                "calibration factor must be finite and > 0",
            ));
        }
        let mut map = BTreeMap::new();
        for p in profiles {
            if !(p.base_steps_per_ml.is_finite() && p.base_steps_per_ml > 0.0) {
                return Err(BuildError::InvalidConfig(
                    "base steps per mL must be finite and > 0",
                ));
            }
            map.insert(p.size_ml, p);
        }
        let default = *map
            .get(&default_size_ml)
            .ok_or(BuildError::UnknownDefaultSyringe(default_size_ml))?;
        Ok(Self {
            profiles: map,
            default,
            factor,
        })
    }

    /// Profile for `size_ml`, or the default profile when the size is unknown.
    pub fn resolve(&self, size_ml: u32) -> SyringeProfile {
        self.profiles.get(&size_ml).copied().unwrap_or(self.default)
    }

    /// Calibrated steps per millilitre for a syringe size.
    pub fn steps_per_ml(&self, size_ml: u32) -> f64 {
        self.resolve(size_ml).base_steps_per_ml * self.factor
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn default_profile(&self) -> SyringeProfile {
        self.default
    }

    /// Whether `size_ml` has its own profile (as opposed to falling back).
    pub fn is_known(&self, size_ml: u32) -> bool {
        self.profiles.contains_key(&size_ml)
    }

    /// Supported sizes in ascending order.
    pub fn sizes(&self) -> impl Iterator<Item = u32> + '_ {
        self.profiles.keys().copied()
    }
}

impl Default for CalibrationModel {
    /// Bench-measured table for 10/15/20 mL syringes with a 2.5 correction factor.
    fn default() -> Self {
        let profiles = [(10, 303.0), (15, 265.0), (20, 168.0)]
            .into_iter()
            .map(|(size_ml, base_steps_per_ml)| {
                (
                    size_ml,
                    SyringeProfile {
                        size_ml,
                        base_steps_per_ml,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        let default = SyringeProfile {
            size_ml: 10,
            base_steps_per_ml: 303.0,
        };
        Self {
            profiles,
            default,
            factor: 2.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_applies_factor() {
        let cal = CalibrationModel::default();
        assert!((cal.steps_per_ml(10) - 757.5).abs() < 1e-12);
        assert!((cal.steps_per_ml(15) - 662.5).abs() < 1e-12);
        assert!((cal.steps_per_ml(20) - 420.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_size_falls_back_to_default() {
        let cal = CalibrationModel::default();
        assert!(!cal.is_known(50));
        assert_eq!(cal.resolve(50), cal.default_profile());
        assert_eq!(cal.steps_per_ml(50), cal.steps_per_ml(10));
    }

    #[test]
    fn rejects_default_outside_table() {
        let err = CalibrationModel::new(
            [SyringeProfile {
                size_ml: 5,
                base_steps_per_ml: 600.0,
            }],
            10,
            1.0,
        )
        .expect_err("default must exist");
        assert!(matches!(err, BuildError::UnknownDefaultSyringe(10)));
    }

    #[test]
    fn rejects_non_positive_factor() {
        let err = CalibrationModel::new(
            [SyringeProfile {
                size_ml: 10,
                base_steps_per_ml: 303.0,
            }],
            10,
            0.0,
        )
        .expect_err("zero factor");
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }

    #[test]
    fn sizes_are_sorted() {
        let cal = CalibrationModel::default();
        assert_eq!(cal.sizes().collect::<Vec<_>>(), vec![10, 15, 20]);
    }
}
