#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = pump_config::load_toml(data) {
        if cfg.validate().is_ok() {
            if let Ok(rows) = cfg.calibration.rows() {
                let _ = pump_config::validate_rows(&rows);
            }
        }
    }
});
