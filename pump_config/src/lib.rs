#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and syringe profile parsing for the infusion pump.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Syringe profiles come either from the inline `[[calibration.syringes]]`
//!   table or from a CSV file with strict headers.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One syringe size and its measured base rate.
///
/// CSV schema (exact headers):
/// size_ml,steps_per_ml
///
/// Example:
/// size_ml,steps_per_ml
/// 10,303
/// 15,265
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SyringeRow {
    pub size_ml: u32,
    pub steps_per_ml: f64,
}

/// BCM pin numbers wired to the stepper driver inputs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_en: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            motor_step: 23,
            motor_dir: 24,
            motor_en: Some(25),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DriverCfg {
    /// Treat a low ENA level as "coils energized"
    pub enable_active_low: bool,
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            enable_active_low: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Global multiplier applied to every syringe's base steps/mL
    pub factor: f64,
    /// Profile used when a request names an unknown syringe size
    pub default_syringe_ml: u32,
    /// Inline profile table; ignored when `profiles_csv` is set
    pub syringes: Vec<SyringeRow>,
    /// Optional CSV with `size_ml,steps_per_ml` rows
    pub profiles_csv: Option<PathBuf>,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            factor: 2.5,
            default_syringe_ml: 10,
            syringes: vec![
                SyringeRow {
                    size_ml: 10,
                    steps_per_ml: 303.0,
                },
                SyringeRow {
                    size_ml: 15,
                    steps_per_ml: 265.0,
                },
                SyringeRow {
                    size_ml: 20,
                    steps_per_ml: 168.0,
                },
            ],
            profiles_csv: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotionCfg {
    /// Fixed plunger retract rate in steps/s
    pub retract_sps: f64,
    /// Numerical floor substituted for non-positive step rates
    pub min_sps: f64,
    /// Re-check interval while an infusion is paused (ms)
    pub pause_poll_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            retract_sps: 400.0,
            min_sps: 0.0001,
            pause_poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub driver: DriverCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub motion: MotionCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Load syringe profiles from a CSV file with exact headers `size_ml,steps_per_ml`.
pub fn load_syringe_csv(path: &Path) -> eyre::Result<Vec<SyringeRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open syringe CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["size_ml", "steps_per_ml"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "syringe CSV must have headers 'size_ml,steps_per_ml', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SyringeRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    validate_rows(&rows)?;
    Ok(rows)
}

/// Check a syringe profile table: non-empty, positive sizes and rates, no duplicates.
pub fn validate_rows(rows: &[SyringeRow]) -> eyre::Result<()> {
    if rows.is_empty() {
        eyre::bail!("calibration.syringes must list at least one syringe");
    }
    let mut seen = HashSet::new();
    for row in rows {
        if row.size_ml == 0 {
            eyre::bail!("syringe size_ml must be > 0");
        }
        if !(row.steps_per_ml.is_finite() && row.steps_per_ml > 0.0) {
            eyre::bail!(
                "syringe {} mL: steps_per_ml must be a finite value > 0",
                row.size_ml
            );
        }
        if !seen.insert(row.size_ml) {
            eyre::bail!("duplicate syringe size {} mL", row.size_ml);
        }
    }
    Ok(())
}

impl CalibrationCfg {
    /// Effective profile table: the CSV when configured, the inline table otherwise.
    pub fn rows(&self) -> eyre::Result<Vec<SyringeRow>> {
        match &self.profiles_csv {
            Some(path) => load_syringe_csv(path),
            None => Ok(self.syringes.clone()),
        }
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        if p.motor_step == p.motor_dir {
            eyre::bail!("pins.motor_step and pins.motor_dir must differ");
        }
        if let Some(en) = p.motor_en
            && (en == p.motor_step || en == p.motor_dir)
        {
            eyre::bail!("pins.motor_en must differ from motor_step and motor_dir");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.factor.is_finite() && c.factor > 0.0) {
            eyre::bail!("calibration.factor must be a finite value > 0");
        }
        if c.profiles_csv.is_none() {
            validate_rows(&c.syringes)?;
            if !c.syringes.iter().any(|r| r.size_ml == c.default_syringe_ml) {
                eyre::bail!(
                    "calibration.default_syringe_ml = {} is not in calibration.syringes",
                    c.default_syringe_ml
                );
            }
        }

        // Motion
        let m = &self.motion;
        if !(m.retract_sps.is_finite() && m.retract_sps > 0.0) {
            eyre::bail!("motion.retract_sps must be a finite value > 0");
        }
        if !(m.min_sps.is_finite() && m.min_sps > 0.0) {
            eyre::bail!("motion.min_sps must be a finite value > 0");
        }
        if m.pause_poll_ms == 0 || m.pause_poll_ms > 1000 {
            eyre::bail!("motion.pause_poll_ms must be in 1..=1000");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}
