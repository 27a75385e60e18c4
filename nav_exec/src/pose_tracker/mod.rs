//! # Pose tracker module
//!
//! Holds the latest pose of the vehicle as reported by the visual odometry source. Poses are
//! replaced wholesale on every update: there is no interpolation, filtering or history, the most
//! recent pose always wins.
//!
//! The tracker is a cheaply clonable handle around a shared snapshot, so the odometry input
//! thread can update it while the control loop and the goal resolver read from it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Serialize;
use std::sync::{Arc, RwLock};

// Internal
use util::maths::round_dp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum deviation of an incoming quaternion's norm from 1 before it is rejected.
pub const QUAT_NORM_TOLERANCE: f64 = 1e-2;

/// Number of decimal places the Euler angles of a pose are rounded to.
pub const ANGLE_DECIMAL_PLACES: i32 = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and attitude in the odometry frame) of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pose {
    /// The position in the odometry frame.
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Rotation about the x axis, rounded to 2 decimal places.
    ///
    /// Units: degrees
    pub roll_deg: f64,

    /// Rotation about the y axis, rounded to 2 decimal places.
    ///
    /// Units: degrees
    pub pitch_deg: f64,

    /// Rotation about the vertical (z) axis, rounded to 2 decimal places.
    ///
    /// Units: degrees
    pub yaw_deg: f64,
}

/// Shared handle to the latest vehicle pose.
#[derive(Debug, Clone, Default)]
pub struct PoseTracker {
    pose: Arc<RwLock<Option<Pose>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a pose update can be rejected.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoseError {
    #[error("Pose update contains a non-finite value")]
    NonFinite,

    #[error("Orientation quaternion is not unit length (norm = {0})")]
    NonUnitQuaternion(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Build a pose from a position and an orientation quaternion ordered `[x, y, z, w]`.
    ///
    /// The quaternion is converted into roll, pitch and yaw (rotations about the static x, y and z
    /// axes) in degrees, each rounded to [`ANGLE_DECIMAL_PLACES`].
    pub fn from_quaternion(
        position_m: [f64; 3],
        orientation_q: [f64; 4],
    ) -> Result<Self, PoseError> {
        if position_m.iter().chain(orientation_q.iter()).any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite);
        }

        let [qx, qy, qz, qw] = orientation_q;
        let quat = Quaternion::new(qw, qx, qy, qz);

        let quat_norm = quat.norm();
        if (quat_norm - 1.0).abs() > QUAT_NORM_TOLERANCE {
            return Err(PoseError::NonUnitQuaternion(quat_norm));
        }

        let (roll, pitch, yaw) = UnitQuaternion::from_quaternion(quat).euler_angles();

        Ok(Self {
            position_m: Vector3::from(position_m),
            roll_deg: round_dp(roll.to_degrees(), ANGLE_DECIMAL_PLACES),
            pitch_deg: round_dp(pitch.to_degrees(), ANGLE_DECIMAL_PLACES),
            yaw_deg: round_dp(yaw.to_degrees(), ANGLE_DECIMAL_PLACES),
        })
    }

    /// Position of the pose on the ground plane.
    pub fn position_xy(&self) -> [f64; 2] {
        [self.position_m[0], self.position_m[1]]
    }
}

impl PoseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked pose with one built from the given orientation and position.
    ///
    /// Invalid updates are rejected and logged, leaving the previous pose in place.
    pub fn update_pose(
        &self,
        orientation_q: [f64; 4],
        position_m: [f64; 3],
    ) -> Result<Pose, PoseError> {
        let pose = match Pose::from_quaternion(position_m, orientation_q) {
            Ok(p) => p,
            Err(e) => {
                warn!("Rejected pose update: {}", e);
                return Err(e);
            }
        };

        // The stored value is a plain copy so a poisoned lock still holds a whole pose.
        let mut guard = self.pose.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(pose);

        trace!("Pose updated: {:?}", pose);

        Ok(pose)
    }

    /// Get a snapshot of the latest pose, or `None` if no pose has been received yet.
    pub fn pose(&self) -> Option<Pose> {
        *self.pose.read().unwrap_or_else(|e| e.into_inner())
    }
}
