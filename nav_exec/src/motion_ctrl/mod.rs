//! # Motion control module
//!
//! Bang-bang controller steering the vehicle towards the goal pose. Every cycle the heading error
//! and distance to the goal are compared against fixed thresholds to select one of four fixed
//! wheel patterns:
//!
//! | Motion        | Left              | Right             |
//! |---------------|-------------------|-------------------|
//! | Straight      | straight, Forward | straight, Forward |
//! | Hold          | 0, Forward        | 0, Forward        |
//! | Turn CW       | turn, Forward     | turn, Reverse     |
//! | Turn CCW      | turn, Reverse     | turn, Forward     |
//!
//! There is no smoothing or ramping between patterns.
//!
//! The heading error is the raw difference of the goal and current yaws and is not wrapped into
//! [-180, 180]. A vehicle at 170 degrees with a goal at -170 degrees will therefore turn the long
//! way round.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

pub use cmd::*;
pub use params::Params as MotionCtrlParams;

use crate::goal_resolver::GoalPose;
use crate::pose_tracker::Pose;
use util::maths::norm;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Output of one motion control calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionOutput {
    /// The command to send to the motor driver.
    pub cmd: MotorCommand,

    /// The kind of motion selected.
    pub kind: MotionKind,

    /// Goal yaw minus current yaw.
    ///
    /// Units: degrees
    pub yaw_error_deg: f64,

    /// Ground plane distance from the current position to the goal.
    ///
    /// Units: meters
    pub distance_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Motion patterns the controller can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MotionKind {
    Straight,
    Hold,
    TurnCw,
    TurnCcw,
}

/// Direction to turn in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnDir {
    Clockwise,
    CounterClockwise,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the motor command steering from the current pose towards the goal.
pub fn compute_command(params: &MotionCtrlParams, current: &Pose, goal: &GoalPose) -> MotionOutput {
    let yaw_error_deg = goal.yaw_deg - current.yaw_deg;

    // Both points are 2D so the norm always exists
    let distance_m = norm(&current.position_xy(), &goal.position_xy()).unwrap_or(0.0);

    let kind = if yaw_error_deg.abs() < params.heading_threshold_deg {
        if distance_m >= params.distance_threshold_m {
            MotionKind::Straight
        }
        else {
            MotionKind::Hold
        }
    }
    else {
        match turn_direction(yaw_error_deg) {
            TurnDir::Clockwise => MotionKind::TurnCw,
            TurnDir::CounterClockwise => MotionKind::TurnCcw,
        }
    };

    MotionOutput {
        cmd: wheel_pattern(params, kind),
        kind,
        yaw_error_deg,
        distance_m,
    }
}

/// Direction to turn in place to reduce the given yaw error.
///
/// Negative errors turn counter-clockwise, zero and positive errors turn clockwise.
pub fn turn_direction(yaw_error_deg: f64) -> TurnDir {
    if yaw_error_deg < 0.0 {
        TurnDir::CounterClockwise
    }
    else {
        TurnDir::Clockwise
    }
}

/// The fixed wheel pattern for a kind of motion.
pub fn wheel_pattern(params: &MotionCtrlParams, kind: MotionKind) -> MotorCommand {
    use WheelDir::*;

    let (left, right) = match kind {
        MotionKind::Straight => (
            WheelDemand::new(params.straight_speed, Forward),
            WheelDemand::new(params.straight_speed, Forward),
        ),
        MotionKind::Hold => (WheelDemand::stopped(), WheelDemand::stopped()),
        MotionKind::TurnCw => (
            WheelDemand::new(params.turn_speed, Forward),
            WheelDemand::new(params.turn_speed, Reverse),
        ),
        MotionKind::TurnCcw => (
            WheelDemand::new(params.turn_speed, Reverse),
            WheelDemand::new(params.turn_speed, Forward),
        ),
    };

    MotorCommand { left, right }
}
