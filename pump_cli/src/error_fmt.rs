//! Human-readable error descriptions, exit codes and structured JSON errors.

use pump_core::error::{BuildError, PumpError};

/// Stable process exit codes.
pub mod exit {
    pub const GENERIC: i32 = 1;
    pub const INVALID_INPUT: i32 = 3;
    pub const BUSY: i32 = 4;
    pub const HARDWARE: i32 = 5;
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDriver => {
                "What happened: No stepper driver was provided to the infusion engine.\nLikely causes: The motor driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the driver is created successfully and passed via with_driver(...).".to_string()
            }
            BuildError::UnknownDefaultSyringe(size) => format!(
                "What happened: The default syringe ({size} mL) has no calibration profile.\nLikely causes: calibration.default_syringe_ml does not match any row in the syringe table or CSV.\nHow to fix: Add a {size} mL row or change default_syringe_ml."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::InvalidInput(msg) => format!(
                "What happened: The infusion request was rejected ({msg}).\nLikely causes: Flow rate or volume is zero, negative or not a number.\nHow to fix: Pass positive values, e.g. `pump infuse --flow-rate 300 --volume 5 --syringe 10`."
            ),
            PumpError::AlreadyRunning => {
                "What happened: An infusion is already running.\nLikely causes: A previous start has not finished or been cancelled.\nHow to fix: Cancel the active infusion or wait for it to finish.".to_string()
            }
            PumpError::InfusionRunning => {
                "What happened: The plunger cannot be reset while an infusion is running.\nHow to fix: Cancel the infusion or wait for it to finish, then reset.".to_string()
            }
            PumpError::RetractionInProgress => {
                "What happened: A plunger retraction is in progress.\nLikely causes: A reset was requested moments ago; retraction cannot be interrupted.\nHow to fix: Wait for the retraction to finish.".to_string()
            }
            PumpError::Hardware(msg) | PumpError::HardwareFault(msg) => format!(
                "What happened: The motor driver reported an error ({msg}).\nLikely causes: Wiring, power to the driver board, or GPIO permissions.\nHow to fix: Check [pins] and the driver's ENA/STEP/DIR wiring, then run `pump self-check`."
            ),
            PumpError::WorkerUnavailable => {
                "What happened: The motion worker is not running.\nLikely causes: It stopped after an internal failure.\nHow to fix: Restart the process; re-run with --log-level=debug for detail.".to_string()
            }
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins") || lower.contains("open gpio") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("syringe csv must have headers") {
        return "Invalid headers in syringe CSV. Expected 'size_ml,steps_per_ml'.".to_string();
    }

    if let Some(te) = err
        .chain()
        .find_map(|c| c.downcast_ref::<toml::de::Error>())
    {
        return format!(
            "What happened: The config file is not valid TOML for this pump.\nCause: {}\nHow to fix: Compare the file against etc/pump_config.toml.",
            te.message()
        );
    }

    if lower.contains("read config") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file could not be loaded.\nCause: {cause}\nHow to fix: Pass --config with a readable TOML file (see etc/pump_config.toml)."
        );
    }

    if lower.contains("invalid configuration") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid.\nCause: {cause}\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name for the JSON `reason` field.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::InvalidInput(_) => "InvalidInput",
            PumpError::AlreadyRunning => "AlreadyRunning",
            PumpError::InfusionRunning => "InfusionRunning",
            PumpError::RetractionInProgress => "RetractionInProgress",
            PumpError::Hardware(_) => "Hardware",
            PumpError::HardwareFault(_) => "HardwareFault",
            PumpError::WorkerUnavailable => "WorkerUnavailable",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "BuildError";
    }
    "Error"
}

/// Map typed errors to stable exit codes; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<PumpError>() {
        Some(PumpError::InvalidInput(_)) => exit::INVALID_INPUT,
        Some(pe) if pe.is_busy() => exit::BUSY,
        Some(PumpError::Hardware(_) | PumpError::HardwareFault(_)) => exit::HARDWARE,
        _ => exit::GENERIC,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
