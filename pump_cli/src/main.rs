mod cli;
mod console;
mod error_fmt;
mod infuse;
mod logging;
mod setup;

use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use pump_core::hw_error::map_hw_error;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn self_check(cfg: &pump_config::Config, json: bool) -> Result<()> {
    let mut driver = setup::make_driver(cfg)?;
    driver
        .enable()
        .map_err(|e| map_hw_error(&*e))
        .wrap_err("enable driver")?;
    driver
        .disable()
        .map_err(|e| map_hw_error(&*e))
        .wrap_err("disable driver")?;
    let cal = setup::calibration(cfg)?;
    let sizes: Vec<u32> = cal.sizes().collect();
    if json {
        println!(
            "{}",
            serde_json::json!({ "event": "self_check", "ok": true, "syringes_ml": sizes })
        );
    } else {
        println!("OK: driver enable/disable, syringe profiles {sizes:?} mL");
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = setup::load_config(&cli.config)?;
    logging::init(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match &cli.cmd {
        Commands::SelfCheck => self_check(&cfg, cli.json),
        Commands::Plan { request } => {
            let cal = setup::calibration(&cfg)?;
            infuse::run_plan(&cal, cfg.motion.min_sps, request, cli.json)
        }
        Commands::Infuse {
            request,
            retract_after,
            poll_ms,
        } => {
            let ctl = setup::build_controller(&cfg)?;
            infuse::run_infuse(
                &ctl,
                request,
                *retract_after,
                Duration::from_millis(*poll_ms),
                cli.json,
            )
        }
        Commands::Console => {
            let ctl = setup::build_controller(&cfg)?;
            let stdin = std::io::stdin().lock();
            console::run_console(&ctl, stdin, std::io::stdout().lock(), cli.json)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    if let Err(err) = run(&cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}
