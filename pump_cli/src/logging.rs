//! Tracing subscriber setup for the `pump` binary.
//!
//! Console output is pretty text or JSON lines (`--json`). The filter comes
//! from `RUST_LOG` when set, otherwise from `--log-level` or `[logging].level`.
//! When `[logging].file` is set, events are also written as JSON lines to a
//! non-blocking file appender whose guard lives in `FILE_GUARD`.

use std::path::Path;

use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::FILE_GUARD;

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(
    file: &str,
    rotation: Option<&str>,
) -> eyre::Result<tracing_appender::non_blocking::NonBlocking> {
    use tracing_appender::rolling;

    let path = Path::new(file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("create log directory {dir:?}"))?;

    let appender = match rotation.unwrap_or("never") {
        "daily" => rolling::daily(dir, name),
        "hourly" => rolling::hourly(dir, name),
        _ => rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Only the first init keeps its guard; later calls never happen in practice.
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

/// Install the global subscriber. Call once, before any work is done.
pub fn init(cli_level: &str, json: bool, cfg: &pump_config::Logging) -> eyre::Result<()> {
    // An explicit --log-level beats the config file; "info" is the CLI default.
    let level = match cfg.level.as_deref() {
        Some(l) if cli_level == "info" => l,
        _ => cli_level,
    };
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    };
    let file = match cfg.file.as_deref() {
        Some(f) => Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file_writer(f, cfg.rotation.as_deref())?)
                .boxed(),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))?;
    Ok(())
}
