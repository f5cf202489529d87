//! Line-oriented operator console: one command per stdin line.

use std::io::{BufRead, Write};
use std::time::Duration;

use eyre::{Result, WrapErr};
use pump_core::{InfusionController, InfusionRequest, PumpError};
use serde_json::json;

use crate::infuse::{plan_json, status_json};

const HELP: &str = "commands:
  start <flow_ml_per_h> <volume_ml> <syringe_ml>
  pause | resume | cancel
  status
  reset            retract the plunger by the delivered steps
  wait [seconds]   block until the pump is idle (default 60 s)
  quit";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Start(&'a str, &'a str, &'a str),
    Pause,
    Resume,
    Cancel,
    Status,
    Reset,
    Wait(Duration),
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Option<Command<'_>>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let cmd = match (head.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("start", [f, v, s]) => Command::Start(*f, *v, *s),
        ("start", _) => return Err("usage: start <flow_ml_per_h> <volume_ml> <syringe_ml>".into()),
        ("pause", []) => Command::Pause,
        ("resume", []) => Command::Resume,
        ("cancel" | "stop", []) => Command::Cancel,
        ("status", []) => Command::Status,
        ("reset", []) => Command::Reset,
        ("wait", []) => Command::Wait(Duration::from_secs(60)),
        ("wait", [secs]) => {
            let secs: f64 = secs.parse().map_err(|_| format!("bad wait time: {secs}"))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(format!("bad wait time: {secs}"));
            }
            Command::Wait(Duration::from_secs_f64(secs))
        }
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(cmd))
}

fn report_err(out: &mut impl Write, json: bool, err: &PumpError) -> std::io::Result<()> {
    if json {
        writeln!(out, "{}", json!({ "event": "error", "message": err.to_string() }))
    } else {
        writeln!(out, "error: {err}")
    }
}

/// Run commands from `input` until EOF or `quit`. Errors from single commands are reported and the session continues.
pub fn run_console(
    ctl: &InfusionController,
    input: impl BufRead,
    mut out: impl Write,
    json: bool,
) -> Result<()> {
    if !json {
        writeln!(out, "pump console; type `help` for commands")?;
    }
    for line in input.lines() {
        let line = line.wrap_err("read console input")?;
        let cmd = match parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                if json {
                    writeln!(out, "{}", json!({ "event": "error", "message": msg }))?;
                } else {
                    writeln!(out, "error: {msg}")?;
                }
                continue;
            }
        };
        tracing::debug!(?cmd, "console command");
        match cmd {
            Command::Start(f, v, s) => {
                match InfusionRequest::parse(f, v, s).and_then(|req| ctl.start(&req)) {
                    Ok(plan) if json => writeln!(out, "{}", plan_json(&plan))?,
                    Ok(plan) => writeln!(
                        out,
                        "started: {} steps at {:.3} steps/s",
                        plan.total_steps, plan.steps_per_second
                    )?,
                    Err(e) => report_err(&mut out, json, &e)?,
                }
            }
            Command::Pause => {
                let changed = ctl.pause();
                writeln!(out, "{}", if changed { "paused" } else { "not running" })?;
            }
            Command::Resume => {
                let changed = ctl.resume();
                writeln!(out, "{}", if changed { "resumed" } else { "not running" })?;
            }
            Command::Cancel => {
                ctl.cancel();
                writeln!(out, "cancelled")?;
            }
            Command::Status => {
                let st = ctl.status();
                if json {
                    writeln!(out, "{}", status_json(&st))?;
                } else {
                    writeln!(
                        out,
                        "running={} paused={} retracting={} progress={:.1}% steps={}/{} eta={}",
                        st.running,
                        st.paused,
                        st.retracting,
                        st.progress_pct,
                        st.steps_done,
                        st.total_steps,
                        st.eta
                    )?;
                    if let Some(fault) = &st.last_fault {
                        writeln!(out, "last fault: {fault}")?;
                    }
                }
            }
            Command::Reset => match ctl.reset_plunger() {
                Ok(steps) => writeln!(out, "retracting {steps} steps")?,
                Err(e) => report_err(&mut out, json, &e)?,
            },
            Command::Wait(timeout) => {
                let idle = ctl.wait_idle(timeout);
                writeln!(out, "{}", if idle { "idle" } else { "still busy" })?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => break,
        }
        out.flush()?;
    }
    ctl.cancel();
    Ok(())
}
