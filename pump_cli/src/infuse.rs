//! `plan` and `infuse` subcommands plus shared status rendering.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use pump_core::{
    CalibrationModel, InfusionController, InfusionPlan, InfusionRequest, PumpError, StatusReport,
};
use serde_json::json;

use crate::cli::RequestArgs;

impl RequestArgs {
    pub fn to_request(&self) -> Result<InfusionRequest, PumpError> {
        InfusionRequest::new(self.flow_rate, self.volume, self.syringe)
    }
}

pub fn plan_json(plan: &InfusionPlan) -> serde_json::Value {
    json!({
        "event": "plan",
        "flow_rate_ml_per_hour": plan.request.flow_rate_ml_per_hour,
        "volume_ml": plan.request.volume_ml,
        "syringe_ml": plan.request.syringe_size_ml,
        "profile_ml": plan.profile.size_ml,
        "steps_per_ml": plan.steps_per_ml,
        "total_steps": plan.total_steps,
        "steps_per_second": plan.steps_per_second,
        "nominal_seconds": plan.nominal_duration().as_secs_f64(),
    })
}

pub fn print_plan(plan: &InfusionPlan, json: bool) {
    if json {
        println!("{}", plan_json(plan));
        return;
    }
    if plan.profile.size_ml != plan.request.syringe_size_ml {
        println!(
            "note: no profile for {} mL syringe; using the {} mL profile",
            plan.request.syringe_size_ml, plan.profile.size_ml
        );
    }
    println!(
        "plan: {} mL at {} mL/h on {} mL syringe -> {} steps at {:.3} steps/s ({:.2} steps/mL, ~{:.1} s)",
        plan.request.volume_ml,
        plan.request.flow_rate_ml_per_hour,
        plan.profile.size_ml,
        plan.total_steps,
        plan.steps_per_second,
        plan.steps_per_ml,
        plan.nominal_duration().as_secs_f64(),
    );
}

pub fn status_json(st: &StatusReport) -> serde_json::Value {
    json!({
        "event": "status",
        "running": st.running,
        "paused": st.paused,
        "cancelled": st.cancelled,
        "retracting": st.retracting,
        "progress_pct": st.progress_pct,
        "steps_done": st.steps_done,
        "total_steps": st.total_steps,
        "remaining_steps": st.remaining_steps,
        "eta_h": st.eta.hours,
        "eta_m": st.eta.minutes,
        "eta_s": st.eta.seconds,
        "delivered_ml": st.delivered_ml,
        "fault": st.last_fault.as_ref().map(ToString::to_string),
    })
}

fn state_word(st: &StatusReport) -> &'static str {
    if st.retracting {
        "retracting"
    } else if st.paused {
        "paused"
    } else if st.running {
        "running"
    } else if st.cancelled {
        "cancelled"
    } else {
        "idle"
    }
}

pub fn render_progress_bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '#' } else { '-' });
    }
    s.push(']');
    s
}

pub fn print_status(st: &StatusReport, json: bool) {
    if json {
        println!("{}", status_json(st));
        return;
    }
    println!(
        "{} {} {:5.1}% {}/{} steps, {:.3} mL delivered, eta {}",
        state_word(st),
        render_progress_bar(st.progress_pct, 20),
        st.progress_pct,
        st.steps_done,
        st.total_steps,
        st.delivered_ml,
        st.eta,
    );
    if let Some(fault) = &st.last_fault {
        println!("fault: {fault}");
    }
}

/// Compute a plan from calibration alone; no driver is opened.
pub fn plan_for(
    calibration: &CalibrationModel,
    min_sps: f64,
    args: &RequestArgs,
) -> Result<InfusionPlan, PumpError> {
    InfusionPlan::compute(&args.to_request()?, calibration, min_sps)
}

pub fn run_plan(
    calibration: &CalibrationModel,
    min_sps: f64,
    args: &RequestArgs,
    json: bool,
) -> Result<()> {
    let plan = plan_for(calibration, min_sps, args)?;
    print_plan(&plan, json);
    Ok(())
}

/// Run one infusion to its end, printing status every `poll`.
///
/// Ctrl-C cancels the run; the partial delivery is still retracted with `retract_after`.
pub fn run_infuse(
    ctl: &InfusionController,
    args: &RequestArgs,
    retract_after: bool,
    poll: Duration,
    json: bool,
) -> Result<()> {
    let state = ctl.state();
    let handler_state = Arc::clone(&state);
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received; cancelling infusion");
        handler_state.cancel();
    })
    .wrap_err("install Ctrl-C handler")?;

    let plan = ctl.start(&args.to_request()?)?;
    print_plan(&plan, json);

    let poll = poll.max(Duration::from_millis(1));
    while !ctl.wait_idle(poll) {
        print_status(&ctl.status(), json);
    }
    let done = ctl.status();
    print_status(&done, json);

    let outcome = if done.last_fault.is_some() {
        "faulted"
    } else if done.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    if json {
        println!(
            "{}",
            json!({
                "event": "done",
                "outcome": outcome,
                "steps_done": done.steps_done,
                "total_steps": done.total_steps,
                "delivered_ml": done.delivered_ml,
            })
        );
    } else {
        println!(
            "infusion {outcome}: {} of {} steps ({:.3} mL)",
            done.steps_done, done.total_steps, done.delivered_ml
        );
    }

    if retract_after {
        let steps = ctl.reset_plunger()?;
        if !json {
            println!("retracting {steps} steps");
        }
        while !ctl.wait_idle(poll) {}
        let after = ctl.status();
        if let Some(fault) = after.last_fault.clone() {
            return Err(fault).wrap_err("retraction failed");
        }
        if json {
            println!("{}", json!({ "event": "retracted", "steps": steps }));
        } else {
            println!("retraction complete");
        }
    }

    match done.last_fault {
        Some(fault) => Err(fault).wrap_err("infusion stopped by a driver fault"),
        None => Ok(()),
    }
}
