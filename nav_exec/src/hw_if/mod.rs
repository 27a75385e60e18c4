//! # Hardware interface module
//!
//! Abstracts the hardware the navigation executable touches behind two traits:
//!
//! - [`SwitchInput`] - reads the three operator switches.
//! - [`CommandSink`] - accepts motor commands for the motor driver.
//!
//! Ownership of both is held by a [`HwGuard`], which guarantees that on every exit path (normal
//! shutdown, error, or unwinding panic) a final stop command is sent and the switch inputs are
//! released exactly once.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// [`SwitchInput`] implementation reading GPIO pins on the Raspberry Pi.
#[cfg(all(target_arch = "arm", target_os = "linux"))]
pub mod gpio;

#[cfg(test)]
pub mod fake;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, info, warn};
use serde::Deserialize;

use crate::motion_ctrl::MotorCommand;
use crate::safety_gate::SwitchState;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of operator switch samples.
pub trait SwitchInput {
    /// Sample all three switches.
    fn sample(&mut self) -> Result<SwitchState, HwIfError>;

    /// Release the underlying hardware. Calling this more than once shall have no further effect.
    fn release(&mut self);
}

/// Destination for motor commands.
pub trait CommandSink {
    /// Send a command to the motor driver.
    fn send(&mut self, cmd: &MotorCommand) -> Result<(), HwIfError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// GPIO pin assignments of the operator switches.
///
/// Pins use BCM numbering. The defaults (17, 27, 22) are physical header pins 11, 13 and 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SwitchPins {
    pub rtk_available: u8,
    pub operation_enabled: u8,
    pub autonomous_enabled: u8,
}

/// Switch input which always returns the same state.
///
/// Used on targets without GPIO, where the switch state is configured in the parameters.
#[derive(Debug, Clone)]
pub struct FixedSwitches {
    state: SwitchState,
    released: bool,
}

/// Owner of the switch input and command sink.
///
/// When dropped the guard sends a stop command to the sink and releases the switches.
pub struct HwGuard<S: SwitchInput, C: CommandSink> {
    switches: S,
    sink: C,
    released: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HwIfError {
    #[error("Could not access the GPIO peripheral: {0}")]
    GpioError(String),

    #[error("Could not acquire GPIO pin {0}: {1}")]
    PinError(u8, String),

    #[error("The switch inputs have been released")]
    Released,

    #[error("Could not send the motor command: {0}")]
    SendError(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SwitchPins {
    fn default() -> Self {
        Self {
            rtk_available: 17,
            operation_enabled: 27,
            autonomous_enabled: 22,
        }
    }
}

impl FixedSwitches {
    pub fn new(state: SwitchState) -> Self {
        Self {
            state,
            released: false,
        }
    }
}

impl SwitchInput for FixedSwitches {
    fn sample(&mut self) -> Result<SwitchState, HwIfError> {
        match self.released {
            true => Err(HwIfError::Released),
            false => Ok(self.state),
        }
    }

    fn release(&mut self) {
        self.released = true;
    }
}

impl<S: SwitchInput, C: CommandSink> HwGuard<S, C> {
    /// Take ownership of the hardware.
    pub fn new(switches: S, sink: C) -> Self {
        Self {
            switches,
            sink,
            released: false,
        }
    }

    /// Sample the switches.
    pub fn sample(&mut self) -> Result<SwitchState, HwIfError> {
        if self.released {
            return Err(HwIfError::Released);
        }
        self.switches.sample()
    }

    /// Send a command to the motor driver.
    pub fn send(&mut self, cmd: &MotorCommand) -> Result<(), HwIfError> {
        self.sink.send(cmd)
    }

    /// Stop the vehicle and release the switches.
    ///
    /// Only the first call has any effect, later calls (including the one made on drop) return
    /// immediately.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.sink.send(&MotorCommand::stop()) {
            Ok(()) => info!("Final stop command sent"),
            Err(e) => error!("Could not send the final stop command: {}", e),
        }

        self.switches.release();
        info!("Switch inputs released");
    }
}

impl<S: SwitchInput, C: CommandSink> Drop for HwGuard<S, C> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Hardware guard dropped without an explicit release, releasing now");
        }
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::fake::{FakeSink, FakeSwitches};

    fn all_on() -> SwitchState {
        SwitchState {
            rtk_available: true,
            operation_enabled: true,
            autonomous_enabled: true,
        }
    }

    #[test]
    fn test_fixed_switches() {
        let mut sw = FixedSwitches::new(all_on());
        assert_eq!(sw.sample().unwrap(), all_on());

        sw.release();
        sw.release();
        assert!(matches!(sw.sample(), Err(HwIfError::Released)));
    }

    #[test]
    fn test_guard_drop_stops_and_releases() {
        let switches = FakeSwitches::new(vec![all_on()]);
        let sink = FakeSink::new();

        {
            let mut guard = HwGuard::new(switches.clone(), sink.clone());
            guard.send(&crate::motion_ctrl::wheel_pattern(
                &Default::default(),
                crate::motion_ctrl::MotionKind::Straight
            )).unwrap();
        }

        assert_eq!(sink.sent().len(), 2);
        assert_eq!(sink.last(), Some(MotorCommand::stop()));
        assert_eq!(switches.release_count(), 1);
    }

    #[test]
    fn test_guard_releases_once() {
        let switches = FakeSwitches::new(vec![]);
        let sink = FakeSink::new();

        let mut guard = HwGuard::new(switches.clone(), sink.clone());
        guard.release();
        guard.release();
        assert!(matches!(guard.sample(), Err(HwIfError::Released)));
        drop(guard);

        assert_eq!(switches.release_count(), 1);
        assert_eq!(sink.sent(), vec![MotorCommand::stop()]);
    }

    #[test]
    fn test_guard_releases_when_stop_fails() {
        let switches = FakeSwitches::new(vec![]);
        let sink = FakeSink::failing();

        drop(HwGuard::new(switches.clone(), sink.clone()));

        assert_eq!(switches.release_count(), 1);
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let switches = FakeSwitches::new(vec![]);
        let sink = FakeSink::new();

        let (sw, sk) = (switches.clone(), sink.clone());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = HwGuard::new(sw, sk);
            panic!("cycle failed");
        }));

        assert!(result.is_err());
        assert_eq!(switches.release_count(), 1);
        assert_eq!(sink.last(), Some(MotorCommand::stop()));
    }
}
