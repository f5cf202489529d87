#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use pump_core::{InfusionController, SharedState, StatusReport};
use pump_hardware::{SimProbe, SimulatedDriver};
use pump_traits::clock::test_clock::TestClock;
use pump_traits::{Clock, Direction, DriverResult, StepperDriver};

pub type ReverseHook = Box<dyn FnMut(u64) -> DriverResult + Send>;

/// Simulated driver that runs a hook before every forward pulse.
///
/// The hook receives the 1-based index of the pulse about to be emitted; an
/// `Err` aborts that pulse, as a failing GPIO write would. An optional second
/// hook does the same for reverse pulses.
pub struct HookDriver<F> {
    inner: SimulatedDriver,
    forward_sent: u64,
    reverse_sent: u64,
    hook: F,
    reverse_hook: Option<ReverseHook>,
}

impl<F> HookDriver<F>
where
    F: FnMut(u64) -> DriverResult + Send,
{
    pub fn new(hook: F) -> Self {
        Self {
            inner: SimulatedDriver::new(),
            forward_sent: 0,
            reverse_sent: 0,
            hook,
            reverse_hook: None,
        }
    }

    pub fn with_reverse_hook(mut self, hook: ReverseHook) -> Self {
        self.reverse_hook = Some(hook);
        self
    }

    pub fn probe(&self) -> Arc<SimProbe> {
        self.inner.probe()
    }
}

impl<F> StepperDriver for HookDriver<F>
where
    F: FnMut(u64) -> DriverResult + Send,
{
    fn enable(&mut self) -> DriverResult {
        self.inner.enable()
    }
    fn disable(&mut self) -> DriverResult {
        self.inner.disable()
    }
    fn set_direction(&mut self, dir: Direction) -> DriverResult {
        self.inner.set_direction(dir)
    }
    fn set_step(&mut self, high: bool) -> DriverResult {
        self.inner.set_step(high)
    }
    fn emit_pulse(&mut self, half_period: Duration, clock: &dyn Clock) -> DriverResult {
        match self.inner.direction() {
            Direction::Forward => (self.hook)(self.forward_sent + 1)?,
            Direction::Reverse => {
                if let Some(hook) = self.reverse_hook.as_mut() {
                    hook(self.reverse_sent + 1)?;
                }
            }
        }
        self.inner.emit_pulse(half_period, clock)?;
        match self.inner.direction() {
            Direction::Forward => self.forward_sent += 1,
            Direction::Reverse => self.reverse_sent += 1,
        }
        Ok(())
    }
}

/// Late-bound handle so a driver hook can reach the controller's state.
pub type StateSlot = Arc<OnceLock<Arc<SharedState>>>;

pub fn state_slot() -> StateSlot {
    Arc::new(OnceLock::new())
}

/// Controller on a virtual clock whose driver runs `on_pulse(state, n)` before pulse `n`.
pub fn hooked_controller<H>(on_pulse: H) -> (InfusionController, Arc<SimProbe>)
where
    H: Fn(&SharedState, u64) -> DriverResult + Send + 'static,
{
    build_hooked(on_pulse, None)
}

/// As `hooked_controller`, with `on_reverse(n)` run before reverse pulse `n`
/// (counted across retractions).
pub fn hooked_controller_with_reverse<H>(
    on_pulse: H,
    on_reverse: ReverseHook,
) -> (InfusionController, Arc<SimProbe>)
where
    H: Fn(&SharedState, u64) -> DriverResult + Send + 'static,
{
    build_hooked(on_pulse, Some(on_reverse))
}

fn build_hooked<H>(
    on_pulse: H,
    on_reverse: Option<ReverseHook>,
) -> (InfusionController, Arc<SimProbe>)
where
    H: Fn(&SharedState, u64) -> DriverResult + Send + 'static,
{
    let slot = state_slot();
    let hook_slot = Arc::clone(&slot);
    let mut drv = HookDriver::new(move |n| match hook_slot.get() {
        Some(state) => on_pulse(state, n),
        None => Ok(()),
    });
    if let Some(hook) = on_reverse {
        drv = drv.with_reverse_hook(hook);
    }
    let probe = drv.probe();
    let ctl = InfusionController::builder()
        .with_driver(drv)
        .with_clock(TestClock::new())
        .build()
        .expect("controller builds");
    slot.set(ctl.state()).expect("slot set once");
    (ctl, probe)
}

/// Poll `status()` until `pred` holds or `timeout` elapses.
pub fn wait_for_status(
    ctl: &InfusionController,
    timeout: Duration,
    pred: impl Fn(&StatusReport) -> bool,
) -> StatusReport {
    let deadline = Instant::now() + timeout;
    loop {
        let st = ctl.status();
        if pred(&st) || Instant::now() >= deadline {
            return st;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);
