#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Infusion control engine (hardware-agnostic).
//!
//! This crate turns a dosing request (volume, flow rate, syringe size) into a
//! timed sequence of stepper pulses. All hardware interactions go through
//! `pump_traits::StepperDriver` and `pump_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Calibration**: syringe size to steps/mL (`calibration` module)
//! - **Plan**: request validation, total steps and pulse rate (`plan`)
//! - **State**: one lock-guarded run record with admission control (`state`)
//! - **Emitter**: the pulse timing loop with pause/cancel interlocks (`emitter`)
//! - **Workers**: infusion and retraction sequences with drop guards (`worker`)
//! - **Controller**: caller-facing API plus the single motion worker thread
//! - **Status**: progress and ETA derived from a snapshot (`status`)
//!
//! ## Timing
//!
//! Each pulse holds STEP high then low for `1 / (2 * rate)`. Pauses and
//! cancels are observed only at pulse boundaries (or every poll tick while
//! paused); a pulse in flight always completes.

pub mod builder;
pub mod calibration;
pub mod config;
mod conversions;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod hw_error;
pub mod plan;
pub mod state;
pub mod status;
pub mod util;
pub mod worker;

pub use builder::ControllerBuilder;
pub use calibration::{CalibrationModel, SyringeProfile};
pub use config::MotionCfg;
pub use controller::InfusionController;
pub use emitter::{EmitFault, Interlock, PulseEmitter, RunInterlock, Uninterruptible};
pub use error::{BuildError, PumpError};
pub use plan::{InfusionPlan, InfusionRequest};
pub use state::{RunId, RunState, SharedState};
pub use status::{Eta, StatusReport};
pub use worker::{InfusionReport, RetractionReport, RunEnd, run_infusion, run_retraction};
