//! Commands output by MotionCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use comms_if::eqpt::nav::MotorDems;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Demand for a single side of the differential drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WheelDemand {
    /// Speed magnitude as understood by the motor driver.
    pub speed: u8,

    /// Direction the wheels on this side shall turn.
    pub dir: WheelDir,
}

/// A command to the motor driver, one demand for each side of the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MotorCommand {
    pub left: WheelDemand,
    pub right: WheelDemand,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction of rotation of a side's wheels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WheelDir {
    Reverse = 0,
    Forward = 1,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelDemand {
    pub fn new(speed: u8, dir: WheelDir) -> Self {
        Self { speed, dir }
    }

    /// Zero speed with the wheels set forward.
    pub fn stopped() -> Self {
        Self::new(0, WheelDir::Forward)
    }
}

impl MotorCommand {
    /// The stop command: zero speed on both sides, both set forward.
    pub fn stop() -> Self {
        Self {
            left: WheelDemand::stopped(),
            right: WheelDemand::stopped(),
        }
    }

    /// Returns true if both sides are commanded to zero speed.
    pub fn is_stop(&self) -> bool {
        self.left.speed == 0 && self.right.speed == 0
    }
}

impl Default for MotorCommand {
    fn default() -> Self {
        Self::stop()
    }
}

impl From<MotorCommand> for MotorDems {
    fn from(cmd: MotorCommand) -> Self {
        MotorDems {
            left_speed: cmd.left.speed,
            left_dir: cmd.left.dir as u8,
            right_speed: cmd.right.speed,
            right_dir: cmd.right.dir as u8,
        }
    }
}
