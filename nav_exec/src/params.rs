//! # Navigation Executable Parameters
//!
//! This module provides parameters for the navigation executable, loaded from `nav_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;

use crate::{
    hw_if::SwitchPins,
    motion_ctrl::MotionCtrlParams,
    safety_gate::SwitchState
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NavExecParams {

    /// Period of the control loop.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// GPIO pins the operator switches are wired to.
    #[serde(default)]
    pub switch_pins: SwitchPins,

    /// Switch state used on targets without GPIO.
    #[serde(default)]
    pub fixed_switches: SwitchState,

    /// Motion control thresholds and speeds.
    #[serde(default)]
    pub motion: MotionCtrlParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NavExecParamsError {
    #[error("The cycle period must be a positive finite number of seconds, found {0}")]
    InvalidCyclePeriod(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavExecParams {
    /// The control loop period as a `Duration`.
    pub fn cycle_period(&self) -> Result<Duration, NavExecParamsError> {
        let s = self.cycle_period_s;

        // Upper bound keeps `from_secs_f64` from overflowing
        if s.is_finite() && s > 0.0 && s < u64::MAX as f64 {
            Ok(Duration::from_secs_f64(s))
        }
        else {
            Err(NavExecParamsError::InvalidCyclePeriod(s))
        }
    }
}
