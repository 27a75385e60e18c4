//! Operator switches read from Raspberry Pi GPIO pins

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use rppal::gpio::{Gpio, InputPin};

use super::{HwIfError, SwitchInput, SwitchPins};
use crate::safety_gate::SwitchState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The three switch input pins. The switches are active high.
pub struct GpioSwitches {
    pins: Option<Pins>,
}

struct Pins {
    rtk_available: InputPin,
    operation_enabled: InputPin,
    autonomous_enabled: InputPin,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GpioSwitches {
    /// Acquire the switch pins and configure them as inputs.
    pub fn new(pins: &SwitchPins) -> Result<Self, HwIfError> {
        let gpio = Gpio::new().map_err(|e| HwIfError::GpioError(e.to_string()))?;

        let input = |pin: u8| -> Result<InputPin, HwIfError> {
            gpio.get(pin)
                .map(|p| p.into_input())
                .map_err(|e| HwIfError::PinError(pin, e.to_string()))
        };

        let pins = Pins {
            rtk_available: input(pins.rtk_available)?,
            operation_enabled: input(pins.operation_enabled)?,
            autonomous_enabled: input(pins.autonomous_enabled)?,
        };

        debug!(
            "Switch pins acquired: RTK = {}, operation = {}, autonomous = {}",
            pins.rtk_available.pin(),
            pins.operation_enabled.pin(),
            pins.autonomous_enabled.pin()
        );

        Ok(Self { pins: Some(pins) })
    }
}

impl SwitchInput for GpioSwitches {
    fn sample(&mut self) -> Result<SwitchState, HwIfError> {
        let pins = self.pins.as_ref().ok_or(HwIfError::Released)?;

        Ok(SwitchState {
            rtk_available: pins.rtk_available.is_high(),
            operation_enabled: pins.operation_enabled.is_high(),
            autonomous_enabled: pins.autonomous_enabled.is_high(),
        })
    }

    fn release(&mut self) {
        // Dropping the pins resets them to their original state
        if self.pins.take().is_some() {
            debug!("Switch pins reset");
        }
    }
}
