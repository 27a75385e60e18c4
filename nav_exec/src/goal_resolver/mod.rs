//! # Goal resolver module
//!
//! Converts relative displacement reports from the positioning source into an absolute goal pose
//! in the odometry frame.
//!
//! The displacement vector is expressed in the positioning frame, so it is first rotated into the
//! odometry frame by a [`RotationMatrix`]. The matrix is computed once from the vehicle's bearing
//! when RTK first becomes available and is never recomputed afterwards, even if the bearing
//! changes later in the run.
//!
//! Each report is projected from the pose at the instant the report arrives. The goal is not
//! re-projected as the vehicle moves, and every new report overwrites the previous goal.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::nav::DisplacementMsg;
use log::{debug, info, warn};
use nalgebra::{Matrix2, Vector2, Vector3};
use serde::Serialize;
use std::sync::{Arc, Mutex};

// Internal
use crate::pose_tracker::{Pose, PoseTracker};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A displacement report from the positioning source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplacementReport {
    /// Relative offset to the goal along the x axis of the positioning frame.
    ///
    /// Units: meters
    pub dx_m: f64,

    /// Relative offset to the goal along the y axis of the positioning frame.
    ///
    /// Units: meters
    pub dy_m: f64,

    /// Straight line distance to the goal.
    ///
    /// Units: meters
    pub straight_line_m: f64,

    /// Angle the vehicle must turn through to face the goal.
    ///
    /// Units: degrees
    pub turn_angle_deg: f64,

    /// Current bearing of the vehicle.
    ///
    /// Units: degrees
    pub current_bearing_deg: f64,
}

/// The target pose the control loop steers towards.
///
/// Only the x/y position and yaw are meaningful, z, roll and pitch are copied from the pose the
/// goal was projected from.
pub type GoalPose = Pose;

/// A 2D rotation taking displacement vectors from the positioning frame into the odometry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(Matrix2<f64>);

/// Shared handle resolving displacement reports into goal poses.
#[derive(Debug, Clone)]
pub struct GoalResolver {
    pose_tracker: PoseTracker,
    state: Arc<Mutex<ResolverState>>,
}

#[derive(Debug, Default)]
struct ResolverState {
    rotation: Option<RotationMatrix>,
    latest_bearing_deg: Option<f64>,
    goal: Option<GoalPose>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GoalError {
    #[error("The rotation matrix has already been initialised")]
    RotationAlreadyInitialised,

    #[error("No bearing has been received from the positioning source")]
    NoBearing,

    #[error("Displacement report contains a non-finite value: {0:?}")]
    InvalidReport(DisplacementReport),
}

/// What happened to a displacement report once it was handled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportOutcome {
    /// A new goal was resolved from the report.
    GoalUpdated(GoalPose),

    /// The bearing was recorded but no goal could be resolved as the rotation isn't initialised.
    RotationNotInitialised,

    /// The bearing was recorded but no goal could be resolved as no pose has been received.
    NoPose,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the auxiliary angle used to build the rotation matrix from a bearing.
///
/// If `|bearing| <= 90` the angle is `90 - bearing`, otherwise `bearing - 90`. Both branches give
/// zero at exactly 90 degrees.
///
/// Units: degrees
pub fn aux_angle_deg(bearing_deg: f64) -> f64 {
    if bearing_deg.abs() <= 90.0 {
        90.0 - bearing_deg
    }
    else {
        bearing_deg - 90.0
    }
}

/// Project a displacement report into a goal pose from the given current pose.
///
/// The goal position is `rotation * (dx, dy) + current.xy`, and the goal yaw is the current yaw
/// plus the report's turn angle.
pub fn resolve_goal(
    rotation: &RotationMatrix,
    report: &DisplacementReport,
    current: &Pose,
) -> GoalPose {
    let offset = rotation.apply(Vector2::new(report.dx_m, report.dy_m));

    GoalPose {
        position_m: Vector3::new(
            current.position_m[0] + offset[0],
            current.position_m[1] + offset[1],
            current.position_m[2],
        ),
        roll_deg: current.roll_deg,
        pitch_deg: current.pitch_deg,
        yaw_deg: current.yaw_deg + report.turn_angle_deg,
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DisplacementReport {
    /// True if every field of the report is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.dx_m,
            self.dy_m,
            self.straight_line_m,
            self.turn_angle_deg,
            self.current_bearing_deg,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl From<DisplacementMsg> for DisplacementReport {
    fn from(msg: DisplacementMsg) -> Self {
        Self {
            dx_m: msg.x,
            dy_m: msg.y,
            straight_line_m: msg.straight_line,
            turn_angle_deg: msg.turn_angle,
            current_bearing_deg: msg.current_bearing,
        }
    }
}

impl RotationMatrix {
    /// Build the rotation matrix from the vehicle's bearing.
    ///
    /// Units: degrees
    pub fn from_bearing_deg(bearing_deg: f64) -> Self {
        Self::from_angle_deg(aux_angle_deg(bearing_deg))
    }

    /// Build a rotation matrix rotating counter-clockwise by `theta_deg`.
    pub fn from_angle_deg(theta_deg: f64) -> Self {
        let (sin, cos) = theta_deg.to_radians().sin_cos();

        Self(Matrix2::new(
            cos, -sin,
            sin, cos
        ))
    }

    /// Rotate a vector by this matrix.
    pub fn apply(&self, vector: Vector2<f64>) -> Vector2<f64> {
        self.0 * vector
    }

    pub fn matrix(&self) -> &Matrix2<f64> {
        &self.0
    }
}

impl GoalResolver {
    /// Create a new resolver reading the current pose from the given tracker.
    pub fn new(pose_tracker: PoseTracker) -> Self {
        Self {
            pose_tracker,
            state: Arc::new(Mutex::new(ResolverState::default())),
        }
    }

    /// Initialise the rotation matrix from an explicit bearing.
    ///
    /// This may only be called once per run, while the vehicle is stationary and RTK is
    /// available.
    pub fn initialise_rotation(&self, bearing_deg: f64) -> Result<RotationMatrix, GoalError> {
        let mut state = self.lock();

        if state.rotation.is_some() {
            return Err(GoalError::RotationAlreadyInitialised);
        }

        let rotation = RotationMatrix::from_bearing_deg(bearing_deg);
        state.rotation = Some(rotation);

        info!("The initial bearing used for the rotation matrix is: {} deg", bearing_deg);
        debug!("Rotation matrix: {:?}", rotation.matrix());

        Ok(rotation)
    }

    /// Initialise the rotation matrix from the latest bearing received from the positioning
    /// source.
    pub fn initialise_rotation_from_latest(&self) -> Result<RotationMatrix, GoalError> {
        let bearing_deg = self.latest_bearing_deg().ok_or(GoalError::NoBearing)?;
        self.initialise_rotation(bearing_deg)
    }

    /// Handle a new displacement report, resolving a new goal if possible.
    ///
    /// The bearing in the report is always recorded. A goal is only resolved once the rotation has
    /// been initialised and a pose has been received, otherwise the current goal is left
    /// unchanged.
    pub fn on_displacement_report(
        &self,
        report: DisplacementReport,
    ) -> Result<ReportOutcome, GoalError> {
        if !report.is_finite() {
            warn!("Rejected displacement report: {:?}", report);
            return Err(GoalError::InvalidReport(report));
        }

        // Snapshot the pose before taking the resolver lock, the tracker has its own lock.
        let current_pose = self.pose_tracker.pose();

        let mut state = self.lock();
        state.latest_bearing_deg = Some(report.current_bearing_deg);

        let rotation = match state.rotation {
            Some(r) => r,
            None => {
                debug!("Rotation not initialised, no goal resolved from {:?}", report);
                return Ok(ReportOutcome::RotationNotInitialised);
            }
        };

        let current_pose = match current_pose {
            Some(p) => p,
            None => {
                warn!("No pose received yet, no goal resolved from {:?}", report);
                return Ok(ReportOutcome::NoPose);
            }
        };

        let goal = resolve_goal(&rotation, &report, &current_pose);
        state.goal = Some(goal);

        debug!("New goal: {:?}", goal);

        Ok(ReportOutcome::GoalUpdated(goal))
    }

    /// Snapshot of the current goal.
    pub fn goal(&self) -> Option<GoalPose> {
        self.lock().goal
    }

    /// The rotation matrix, if initialised.
    pub fn rotation(&self) -> Option<RotationMatrix> {
        self.lock().rotation
    }

    /// The latest bearing received from the positioning source.
    pub fn latest_bearing_deg(&self) -> Option<f64> {
        self.lock().latest_bearing_deg
    }

    /// Handle to the tracker goals are projected from.
    pub fn pose_tracker(&self) -> &PoseTracker {
        &self.pose_tracker
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolverState> {
        // State is only ever assigned whole values, so it is consistent even if poisoned.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
