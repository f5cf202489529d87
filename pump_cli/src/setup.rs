//! Config loading and hardware assembly.

use std::path::Path;

use eyre::{Result, WrapErr};
use pump_core::{CalibrationModel, InfusionController, MotionCfg};
use pump_traits::StepperDriver;

/// Read, parse and validate the TOML config.
pub fn load_config(path: &Path) -> Result<pump_config::Config> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("read config {path:?}"))?;
    let cfg = pump_config::load_toml(&text).wrap_err_with(|| format!("parse config {path:?}"))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Calibration from the inline table or the configured CSV.
pub fn calibration(cfg: &pump_config::Config) -> Result<CalibrationModel> {
    let rows = cfg.calibration.rows()?;
    let model = CalibrationModel::from_rows(&rows, &cfg.calibration)?;
    Ok(model)
}

/// Open the stepper driver for this build: TB6600 GPIO with the `hardware` feature, simulated otherwise.
pub fn make_driver(cfg: &pump_config::Config) -> Result<Box<dyn StepperDriver + Send>> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let pins = pump_hardware::Tb6600Pins {
            step: cfg.pins.motor_step,
            dir: cfg.pins.motor_dir,
            enable: cfg.pins.motor_en,
            enable_active_low: cfg.driver.enable_active_low,
        };
        let drv = pump_hardware::Tb6600::new(pins)?;
        Ok(Box::new(drv))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        tracing::info!(
            step = cfg.pins.motor_step,
            dir = cfg.pins.motor_dir,
            "no GPIO backend in this build; using simulated driver"
        );
        Ok(Box::new(pump_hardware::SimulatedDriver::new()))
    }
}

pub fn build_controller(cfg: &pump_config::Config) -> Result<InfusionController> {
    let calibration = calibration(cfg)?;
    let motion = MotionCfg::from(&cfg.motion);
    InfusionController::builder()
        .with_driver(make_driver(cfg)?)
        .with_calibration(calibration)
        .with_motion(motion)
        .build()
}
