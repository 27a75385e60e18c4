//! # Navigation control module
//!
//! Per-cycle processing of the navigation executable. Each cycle NavCtrl steps the
//! [`SafetyGate`] with the sampled switches and, once the gate permits motion, asks the motion
//! controller for a command steering from the latest pose towards the latest goal.
//!
//! Every cycle produces exactly one command. Whenever motion is not permitted, or there is no pose
//! or goal to steer with, that command is a stop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::nav::MotorDems;
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use crate::{
    goal_resolver::{GoalError, GoalResolver},
    motion_ctrl::{self, MotionCtrlParams, MotionKind, MotorCommand},
    params::NavExecParams,
    safety_gate::{GateDecision, GateState, GateStep, SafetyGate, StopCause, SwitchState},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Navigation control module state
pub struct NavCtrl {
    params: MotionCtrlParams,

    resolver: GoalResolver,

    gate: SafetyGate,

    /// True if the previous cycle had no pose or goal to steer with.
    missing_input: bool,

    report: StatusReport,
    arch_report: Archiver,
}

/// Status report for NavCtrl processing.
///
/// This is flat so that it can be archived directly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    /// Session time at which the report was made.
    ///
    /// Units: seconds
    pub time_s: f64,

    pub gate_state: GateState,

    pub action: CycleAction,

    /// Units: degrees
    pub yaw_error_deg: Option<f64>,

    /// Units: meters
    pub distance_m: Option<f64>,

    pub left_speed: u8,
    pub left_dir: u8,
    pub right_speed: u8,
    pub right_dir: u8,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What NavCtrl did on a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CycleAction {
    /// Waiting for RTK or a bearing.
    Wait,

    /// The rotation matrix was initialised.
    InitRotation,

    StopAutonomousOff,
    StopRtkLost,
    StopOperationOff,

    /// Motion permitted but there is no pose or goal yet.
    StopNoGoal,

    Straight,
    Hold,
    TurnCw,
    TurnCcw,
}

#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not load the parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Could not open the archive: {0}")]
    ArchiveError(ArchiveError),

    #[error("Could not initialise the rotation matrix: {0}")]
    RotationInitError(GoalError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavCtrl {
    /// Create a new module steering towards goals from the given resolver.
    ///
    /// Motion parameters take their default values until [`State::init`] is called.
    pub fn new(resolver: GoalResolver) -> Self {
        Self::with_params(resolver, MotionCtrlParams::default())
    }

    /// Create a new module with explicit motion parameters.
    pub fn with_params(resolver: GoalResolver, params: MotionCtrlParams) -> Self {
        Self {
            params,
            resolver,
            gate: SafetyGate::new(),
            missing_input: false,
            report: StatusReport::new(GateState::WaitForRtk, CycleAction::Wait),
            arch_report: Archiver::default(),
        }
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// The report from the last cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    fn init_rotation(&mut self) -> Result<(), NavCtrlError> {
        match self.resolver.initialise_rotation_from_latest() {
            Ok(_) => (),
            // Already done, nothing to redo
            Err(GoalError::RotationAlreadyInitialised) => {
                warn!("Rotation matrix was already initialised");
            }
            Err(e) => return Err(NavCtrlError::RotationInitError(e)),
        }

        self.gate.rotation_initialised();
        Ok(())
    }

    /// Steer towards the goal, returning the command, action and motion calculation values.
    fn steer(&mut self) -> (MotorCommand, CycleAction, Option<(f64, f64)>) {
        let pose = self.resolver.pose_tracker().pose();
        let goal = self.resolver.goal();

        let (pose, goal) = match (pose, goal) {
            (Some(p), Some(g)) => (p, g),
            (p, g) => {
                if !self.missing_input {
                    warn!(
                        "Motion permitted but cannot steer (pose received: {}, goal received: {}), \
                        holding the vehicle stopped",
                        p.is_some(),
                        g.is_some()
                    );
                }
                self.missing_input = true;
                return (MotorCommand::stop(), CycleAction::StopNoGoal, None);
            }
        };
        self.missing_input = false;

        let out = motion_ctrl::compute_command(&self.params, &pose, &goal);

        trace!(
            "Motion: {:?}, yaw error = {:.2} deg, distance = {:.3} m",
            out.kind,
            out.yaw_error_deg,
            out.distance_m
        );

        (out.cmd, out.kind.into(), Some((out.yaw_error_deg, out.distance_m)))
    }
}

impl State for NavCtrl {
    type InitData = &'static str;
    type InitError = NavCtrlError;

    type InputData = SwitchState;
    type OutputData = MotorCommand;
    type StatusReport = StatusReport;
    type ProcError = NavCtrlError;

    /// Initialise the NavCtrl module.
    ///
    /// Expected init data is the path to the executable's parameter file.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let exec_params: NavExecParams = params::load(init_data)
            .map_err(NavCtrlError::ParamLoadError)?;
        self.params = exec_params.motion;

        debug!("NavCtrl parameters: {:?}", self.params);

        self.arch_report = Archiver::from_path(session, "nav_ctrl/status_report.csv")
            .map_err(NavCtrlError::ArchiveError)?;

        Ok(())
    }

    /// Perform cyclic processing of navigation control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let bearing_available = self.resolver.latest_bearing_deg().is_some();

        let mut motion = None;

        let (cmd, action) = match self.gate.step(*input_data, bearing_available) {
            GateStep::Wait => (MotorCommand::stop(), CycleAction::Wait),
            GateStep::InitRotation => {
                self.init_rotation()?;
                (MotorCommand::stop(), CycleAction::InitRotation)
            }
            GateStep::Decide(GateDecision::Stop(cause)) => (MotorCommand::stop(), cause.into()),
            GateStep::Decide(GateDecision::Proceed) => {
                let (cmd, action, m) = self.steer();
                motion = m;
                (cmd, action)
            }
        };

        let mut report = StatusReport::new(self.gate.state(), action);
        report.set_cmd(&cmd);
        if let Some((yaw_error_deg, distance_m)) = motion {
            report.yaw_error_deg = Some(yaw_error_deg);
            report.distance_m = Some(distance_m);
        }

        self.report = report;

        Ok((cmd, report))
    }
}

impl Archived for NavCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(&self.report)
    }
}

impl StatusReport {
    fn new(gate_state: GateState, action: CycleAction) -> Self {
        let stop = MotorDems::default();

        Self {
            time_s: session::get_elapsed_seconds(),
            gate_state,
            action,
            yaw_error_deg: None,
            distance_m: None,
            left_speed: stop.left_speed,
            left_dir: stop.left_dir,
            right_speed: stop.right_speed,
            right_dir: stop.right_dir,
        }
    }

    fn set_cmd(&mut self, cmd: &MotorCommand) {
        let dems = MotorDems::from(*cmd);
        self.left_speed = dems.left_speed;
        self.left_dir = dems.left_dir;
        self.right_speed = dems.right_speed;
        self.right_dir = dems.right_dir;
    }
}

impl From<StopCause> for CycleAction {
    fn from(cause: StopCause) -> Self {
        match cause {
            StopCause::AutonomousOff => CycleAction::StopAutonomousOff,
            StopCause::RtkLost => CycleAction::StopRtkLost,
            StopCause::OperationOff => CycleAction::StopOperationOff,
        }
    }
}

impl From<MotionKind> for CycleAction {
    fn from(kind: MotionKind) -> Self {
        match kind {
            MotionKind::Straight => CycleAction::Straight,
            MotionKind::Hold => CycleAction::Hold,
            MotionKind::TurnCw => CycleAction::TurnCw,
            MotionKind::TurnCcw => CycleAction::TurnCcw,
        }
    }
}
