//! Shared run state for the infusion engine.
//!
//! One `Mutex` covers the whole record so every reader sees a consistent set
//! of flags and counters. A `Condvar` wakes a paused worker on resume/cancel;
//! the worker still re-checks every poll tick, so resume latency stays bounded
//! even without a notification.
//!
//! Lifecycle: Idle -> Running <-> Paused -> {Completed | Cancelled} -> Idle.
//! Each admitted infusion gets a fresh run id; a worker whose run id is no
//! longer current behaves as if cancelled and never writes progress.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::PumpError;
use crate::plan::InfusionPlan;

/// Identifier of one admitted infusion.
pub type RunId = u64;

/// Snapshot of the run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub running: bool,
    pub paused: bool,
    pub cancelled: bool,
    pub retracting: bool,
    pub total_steps: u64,
    /// Never exceeds `total_steps`.
    pub steps_done: u64,
    pub steps_per_second: f64,
    pub steps_per_ml: f64,
    pub syringe_size_ml: u32,
    pub volume_ml: f64,
    pub flow_rate_ml_per_hour: f64,
    /// Pulses sent by the most recently finished infusion; consumed by retraction.
    pub delivered_steps: u64,
    /// Admitted background jobs that have not finished yet.
    pub pending_jobs: u32,
    pub run_id: RunId,
    /// Driver error that ended the most recent infusion or retraction, if any.
    pub last_fault: Option<PumpError>,
}

#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<RunState>,
    wake: Condvar,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // The record stays meaningful even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of every field. Never waits on the worker beyond the lock.
    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    /// Admit a new infusion and publish its plan.
    ///
    /// Rejected without touching the record while an infusion or a retraction is active.
    pub fn begin_infusion(&self, plan: &InfusionPlan) -> Result<RunId, PumpError> {
        let mut s = self.lock();
        if s.running {
            return Err(PumpError::AlreadyRunning);
        }
        if s.retracting {
            return Err(PumpError::RetractionInProgress);
        }
        s.run_id = s.run_id.wrapping_add(1);
        s.running = true;
        s.paused = false;
        s.cancelled = false;
        s.total_steps = plan.total_steps;
        s.steps_done = 0;
        s.steps_per_second = plan.steps_per_second;
        s.steps_per_ml = plan.steps_per_ml;
        s.syringe_size_ml = plan.profile.size_ml;
        s.volume_ml = plan.request.volume_ml;
        s.flow_rate_ml_per_hour = plan.request.flow_rate_ml_per_hour;
        s.last_fault = None;
        s.pending_jobs = s.pending_jobs.saturating_add(1);
        Ok(s.run_id)
    }

    /// Hold the active run. No-op unless running.
    pub fn pause(&self) -> bool {
        let mut s = self.lock();
        if s.running {
            s.paused = true;
        }
        s.running
    }

    /// Release a held run. No-op unless running.
    pub fn resume(&self) -> bool {
        let mut s = self.lock();
        if s.running {
            s.paused = false;
            self.wake.notify_all();
        }
        s.running
    }

    /// Cancel immediately. Idempotent; visible to readers before the worker reacts.
    pub fn cancel(&self) {
        let mut s = self.lock();
        s.cancelled = true;
        s.running = false;
        s.paused = false;
        self.wake.notify_all();
    }

    /// Whether run `run` must stop: cancelled, or superseded by a newer run.
    pub fn should_stop(&self, run: RunId) -> bool {
        let s = self.lock();
        s.cancelled || s.run_id != run
    }

    /// Block while run `run` is paused, re-checking at least every `tick`.
    pub fn wait_while_paused(&self, run: RunId, tick: Duration) {
        let mut s = self.lock();
        while s.paused && !s.cancelled && s.run_id == run {
            s = self
                .wake
                .wait_timeout(s, tick)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Publish progress for run `run`. Ignored once the run has been superseded.
    pub fn record_progress(&self, run: RunId, steps_sent: u64) {
        let mut s = self.lock();
        if s.run_id == run {
            s.steps_done = steps_sent.min(s.total_steps);
        }
    }

    /// Terminal transition for an infusion worker, whatever the exit path.
    ///
    /// Clears `running`/`paused` for the current run and stores the delivered
    /// pulse count in the same critical section, so a retraction admitted
    /// afterwards always sees the final count.
    pub fn finish_infusion(&self, run: RunId, steps_sent: u64) {
        let mut s = self.lock();
        if s.run_id == run {
            s.running = false;
            s.paused = false;
            s.steps_done = steps_sent.min(s.total_steps);
        }
        s.delivered_steps = steps_sent;
        s.pending_jobs = s.pending_jobs.saturating_sub(1);
        self.wake.notify_all();
    }

    /// Admit a retraction. Rejected while an infusion runs or another retraction is active.
    pub fn begin_retraction(&self) -> Result<(), PumpError> {
        let mut s = self.lock();
        if s.running {
            return Err(PumpError::InfusionRunning);
        }
        if s.retracting {
            return Err(PumpError::RetractionInProgress);
        }
        s.retracting = true;
        s.last_fault = None;
        s.pending_jobs = s.pending_jobs.saturating_add(1);
        Ok(())
    }

    /// Remember a driver fault for status readers. Set before the terminal transition.
    pub fn record_fault(&self, err: PumpError) {
        self.lock().last_fault = Some(err);
    }

    pub fn delivered_steps(&self) -> u64 {
        self.lock().delivered_steps
    }

    /// Terminal transition for a retraction: subtract what was retracted.
    pub fn finish_retraction(&self, retracted: u64) {
        let mut s = self.lock();
        s.delivered_steps = s.delivered_steps.saturating_sub(retracted);
        s.retracting = false;
        s.pending_jobs = s.pending_jobs.saturating_sub(1);
        self.wake.notify_all();
    }

    /// Roll back an admission whose job never reached the worker.
    pub(crate) fn abandon_job(&self, run: Option<RunId>) {
        let mut s = self.lock();
        match run {
            Some(id) if s.run_id == id => {
                s.running = false;
                s.paused = false;
            }
            Some(_) => {}
            None => s.retracting = false,
        }
        s.pending_jobs = s.pending_jobs.saturating_sub(1);
        self.wake.notify_all();
    }

    /// Wait until every admitted job has finished. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut s = self.lock();
        while s.pending_jobs > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            s = self
                .wake
                .wait_timeout(s, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}
