//! # Navigation Equipment Messages
//!
//! Messages exchanged between the navigation executable and its collaborators:
//!
//! - [`PoseMsg`] - published by the visual odometry source.
//! - [`DisplacementMsg`] - published by the GNSS positioning source.
//! - [`MotorDems`] - published by the navigation executable to the motor driver.
//!
//! All messages are sent as JSON strings.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Vehicle pose as estimated by visual odometry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PoseMsg {
    /// Position of the vehicle in the odometry frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Orientation of the vehicle in the odometry frame as a quaternion, ordered `[x, y, z, w]`.
    pub orientation_q: [f64; 4],
}

/// Displacement from the vehicle to the goal as computed by the positioning source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DisplacementMsg {
    /// Relative offset along the x axis.
    ///
    /// Units: meters
    pub x: f64,

    /// Relative offset along the y axis.
    ///
    /// Units: meters
    pub y: f64,

    /// Straight line distance to the goal.
    ///
    /// Units: meters
    pub straight_line: f64,

    /// Angle the vehicle must turn through to face the goal.
    ///
    /// Units: degrees
    pub turn_angle: f64,

    /// Current bearing of the vehicle.
    ///
    /// Units: degrees
    pub current_bearing: f64,
}

/// Demands sent to the motor driver.
///
/// Speeds are unitless magnitudes understood by the motor driver, directions are `1` for forward
/// and `0` for reverse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorDems {
    pub left_speed: u8,
    pub left_dir: u8,
    pub right_speed: u8,
    pub right_dir: u8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MotorDems {
    /// The default demand is a full stop with both wheels set forward.
    fn default() -> Self {
        Self {
            left_speed: 0,
            left_dir: 1,
            right_speed: 0,
            right_dir: 1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pose_msg_from_json() {
        let msg: PoseMsg = serde_json::from_str(
            r#"{"position_m": [1.0, 2.0, 0.5], "orientation_q": [0.0, 0.0, 0.0, 1.0]}"#,
        )
        .unwrap();

        assert_eq!(msg.position_m, [1.0, 2.0, 0.5]);
        assert_eq!(msg.orientation_q[3], 1.0);
    }

    #[test]
    fn test_displacement_msg_missing_field() {
        let r: Result<DisplacementMsg, _> =
            serde_json::from_str(r#"{"x": 1.0, "y": 2.0, "turn_angle": 0.0}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_default_dems_is_stop() {
        let json = serde_json::to_string(&MotorDems::default()).unwrap();
        assert_eq!(
            json,
            r#"{"left_speed":0,"left_dir":1,"right_speed":0,"right_dir":1}"#
        );
    }
}
