//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pump", version, about = "Syringe pump infusion CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/pump_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// A dosing request as typed on the command line.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Flow rate in mL/h (> 0)
    #[arg(long = "flow-rate", value_name = "ML_PER_H", allow_negative_numbers = true)]
    pub flow_rate: f64,
    /// Volume to deliver in mL (> 0)
    #[arg(long, value_name = "ML", allow_negative_numbers = true)]
    pub volume: f64,
    /// Nominal syringe size in mL; unknown sizes use the default profile
    #[arg(long, value_name = "ML")]
    pub syringe: u32,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the motion plan for a request without moving the motor
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Run one infusion, reporting progress until it ends (Ctrl-C cancels)
    Infuse {
        #[command(flatten)]
        request: RequestArgs,
        /// Retract the plunger by the delivered steps once the infusion ends
        #[arg(long, action = ArgAction::SetTrue)]
        retract_after: bool,
        /// Status polling interval in ms
        #[arg(long, value_name = "MS", default_value_t = 250)]
        poll_ms: u64,
    },
    /// Interactive operator session reading commands from stdin
    Console,
    /// Quick health check: enable and disable the driver once
    SelfCheck,
}
