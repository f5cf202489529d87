//! TB6600 step/dir/enable driver on Raspberry Pi GPIO (BCM numbering).
use pump_traits::{Direction, DriverResult, StepperDriver};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};

/// BCM pin assignment for the driver inputs.
#[derive(Debug, Clone, Copy)]
pub struct Tb6600Pins {
    pub step: u8,
    pub dir: u8,
    /// Optional ENA input; when absent the driver is always energized.
    pub enable: Option<u8>,
    /// Most TB6600 boards enable the output stage on a LOW level.
    pub enable_active_low: bool,
}

pub struct Tb6600 {
    step: OutputPin,
    dir: OutputPin,
    en: Option<OutputPin>,
    enable_active_low: bool,
}

impl Tb6600 {
    /// Claim the GPIO lines. STEP and DIR start low, ENA starts in the disabled level.
    pub fn new(pins: Tb6600Pins) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let step = gpio
            .get(pins.step)
            .map_err(|e| HwError::Gpio(format!("open motor pins (step {}): {e}", pins.step)))?
            .into_output_low();
        let dir = gpio
            .get(pins.dir)
            .map_err(|e| HwError::Gpio(format!("open motor pins (dir {}): {e}", pins.dir)))?
            .into_output_low();
        let en = match pins.enable {
            Some(pin) => {
                let p = gpio
                    .get(pin)
                    .map_err(|e| HwError::Gpio(format!("open motor pins (enable {pin}): {e}")))?;
                Some(if pins.enable_active_low {
                    p.into_output_high()
                } else {
                    p.into_output_low()
                })
            }
            None => None,
        };
        tracing::info!(
            step = pins.step,
            dir = pins.dir,
            enable = ?pins.enable,
            active_low = pins.enable_active_low,
            "tb6600 driver ready"
        );
        Ok(Self {
            step,
            dir,
            en,
            enable_active_low: pins.enable_active_low,
        })
    }

    fn drive_enable(&mut self, on: bool) {
        if let Some(en) = self.en.as_mut() {
            // active-low: LOW energizes the coils
            if on != self.enable_active_low {
                en.set_high();
            } else {
                en.set_low();
            }
        }
    }
}

impl StepperDriver for Tb6600 {
    fn enable(&mut self) -> DriverResult {
        self.drive_enable(true);
        tracing::debug!("driver enabled");
        Ok(())
    }

    fn disable(&mut self) -> DriverResult {
        self.step.set_low();
        self.drive_enable(false);
        tracing::debug!("driver disabled");
        Ok(())
    }

    fn set_direction(&mut self, dir: Direction) -> DriverResult {
        match dir {
            Direction::Forward => self.dir.set_high(),
            Direction::Reverse => self.dir.set_low(),
        }
        Ok(())
    }

    fn set_step(&mut self, high: bool) -> DriverResult {
        if high {
            self.step.set_high();
        } else {
            self.step.set_low();
        }
        Ok(())
    }
}

impl Drop for Tb6600 {
    fn drop(&mut self) {
        // Never leave the coils energized when the process lets go of the pins.
        let _ = self.disable();
    }
}
