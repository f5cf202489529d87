//! Caller-facing control surface and the single motion worker.
//!
//! All requests run on the caller's thread against `SharedState` and return
//! before any motion happens. Admitted work is handed to one dedicated worker
//! thread over a channel, so an infusion and a retraction can never interleave
//! on the driver.
//!
//! The worker thread is shut down and joined when the controller is dropped;
//! a running infusion is cancelled first.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use pump_traits::{Clock, StepperDriver};

use crate::builder::{ControllerBuilder, Missing};
use crate::calibration::CalibrationModel;
use crate::config::MotionCfg;
use crate::emitter::PulseEmitter;
use crate::error::PumpError;
use crate::plan::{InfusionPlan, InfusionRequest};
use crate::state::{RunId, SharedState};
use crate::status::StatusReport;
use crate::worker::{run_infusion, run_retraction};

#[derive(Debug)]
pub(crate) enum Job {
    Infuse { plan: InfusionPlan, run: RunId },
    Retract,
}

impl Job {
    fn run(&self) -> Option<RunId> {
        match self {
            Job::Infuse { run, .. } => Some(*run),
            Job::Retract => None,
        }
    }
}

pub struct InfusionController {
    state: Arc<SharedState>,
    calibration: CalibrationModel,
    motion: MotionCfg,
    tx: Option<xch::Sender<Job>>,
    join_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for InfusionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfusionController")
            .field("state", &self.state.snapshot())
            .field("motion", &self.motion)
            .finish_non_exhaustive()
    }
}

impl InfusionController {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder<Missing> {
        ControllerBuilder::default()
    }

    /// Spawn the motion worker that owns `driver` and `clock`.
    pub(crate) fn spawn<D, C>(
        driver: D,
        clock: C,
        calibration: CalibrationModel,
        motion: MotionCfg,
    ) -> std::io::Result<Self>
    where
        D: StepperDriver + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (tx, rx) = xch::unbounded::<Job>();
        let state = Arc::new(SharedState::new());
        let worker_state = Arc::clone(&state);
        let emitter = PulseEmitter::new(driver, clock).with_min_sps(motion.min_sps);

        let join_handle = std::thread::Builder::new()
            .name("pump-motion".into())
            .spawn(move || motion_loop(&rx, &worker_state, emitter, motion))?;

        Ok(Self {
            state,
            calibration,
            motion,
            tx: Some(tx),
            join_handle: Some(join_handle),
        })
    }

    /// Compute the plan for a request without admitting it.
    pub fn plan(&self, request: &InfusionRequest) -> Result<InfusionPlan, PumpError> {
        InfusionPlan::compute(request, &self.calibration, self.motion.min_sps)
    }

    /// Validate, admit and schedule an infusion. Returns once the plan is published.
    pub fn start(&self, request: &InfusionRequest) -> Result<InfusionPlan, PumpError> {
        let plan = self.plan(request)?;
        let run = self.state.begin_infusion(&plan)?;
        self.dispatch(Job::Infuse { plan, run })?;
        tracing::info!(
            run,
            volume_ml = request.volume_ml,
            flow_ml_h = request.flow_rate_ml_per_hour,
            syringe_ml = plan.profile.size_ml,
            total_steps = plan.total_steps,
            sps = plan.steps_per_second,
            "infusion admitted"
        );
        Ok(plan)
    }

    /// Returns whether an infusion was running.
    pub fn pause(&self) -> bool {
        let running = self.state.pause();
        if running {
            tracing::info!("infusion paused");
        }
        running
    }

    /// Returns whether an infusion was running.
    pub fn resume(&self) -> bool {
        let running = self.state.resume();
        if running {
            tracing::info!("infusion resumed");
        }
        running
    }

    pub fn cancel(&self) {
        self.state.cancel();
        tracing::info!("infusion cancel requested");
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from(self.state.snapshot())
    }

    /// Schedule a retraction of the most recently delivered steps.
    ///
    /// Returns the step count the worker will retract, as known at admission.
    /// A cancelled run that is still finishing its last pulse may add to it.
    pub fn reset_plunger(&self) -> Result<u64, PumpError> {
        self.state.begin_retraction()?;
        let steps = self.state.delivered_steps();
        self.dispatch(Job::Retract)?;
        tracing::info!(steps, "retraction admitted");
        Ok(steps)
    }

    /// Block until all admitted work has finished. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.state.wait_idle(timeout)
    }

    /// Shared state handle, e.g. for a signal handler that cancels.
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    pub fn motion(&self) -> &MotionCfg {
        &self.motion
    }

    fn dispatch(&self, job: Job) -> Result<(), PumpError> {
        let run = job.run();
        let sent = match &self.tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };
        if sent {
            Ok(())
        } else {
            tracing::error!("motion worker is gone; rolling back admission");
            self.state.abandon_job(run);
            Err(PumpError::WorkerUnavailable)
        }
    }
}

fn motion_loop<D: StepperDriver, C: Clock>(
    rx: &xch::Receiver<Job>,
    state: &SharedState,
    mut emitter: PulseEmitter<D, C>,
    motion: MotionCfg,
) {
    for job in rx.iter() {
        match job {
            Job::Infuse { plan, run } => {
                let report = run_infusion(state, &mut emitter, &plan, run, motion.pause_poll);
                tracing::debug!(?report, "infusion job done");
            }
            Job::Retract => {
                let report = run_retraction(state, &mut emitter, motion.retract_sps);
                tracing::debug!(?report, "retraction job done");
            }
        }
    }
    emitter.disable();
    tracing::trace!("motion worker exiting cleanly");
}

impl Drop for InfusionController {
    fn drop(&mut self) {
        self.state.cancel();
        // Closing the channel ends the worker loop after any queued jobs.
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take()
            && handle.join().is_err()
        {
            tracing::error!("motion worker panicked");
        }
    }
}
