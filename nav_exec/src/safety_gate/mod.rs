//! # Safety gate module
//!
//! The safety gate decides, once per cycle, whether motion commands may be issued based on the
//! three operator switches. It is a small state machine:
//!
//! - `WaitForRtk` - Initial state. The operator has not yet indicated RTK is available, the
//!   vehicle is held stopped.
//! - `Ready` - RTK has been indicated as available. The rotation matrix must now be initialised
//!   from the latest bearing, after which the gate moves to `Run`.
//! - `Run` - The switch combination is re-evaluated on every cycle using [`decide`].
//!
//! There is no terminal state, the gate runs until the executable is shut down.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A sample of the three operator switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    /// The operator has indicated that RTK positioning is available.
    pub rtk_available: bool,

    /// The operator has enabled operation.
    pub operation_enabled: bool,

    /// The operator has selected autonomous mode.
    pub autonomous_enabled: bool,
}

/// The safety gate state machine.
#[derive(Debug)]
pub struct SafetyGate {
    state: GateState,

    /// The decision made on the previous `Run` cycle, used to only log changes.
    last_decision: Option<GateDecision>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// States of the safety gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateState {
    WaitForRtk,
    Ready,
    Run,
}

/// Reason motion has been stopped by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopCause {
    /// Autonomous mode is not selected.
    AutonomousOff,

    /// RTK has been lost while in autonomous mode, an emergency stop.
    RtkLost,

    /// RTK is available but the operation switch is off.
    OperationOff,
}

/// Per-cycle decision of the gate once running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateDecision {
    /// Motion is not permitted, the vehicle must be stopped.
    Stop(StopCause),

    /// Motion is permitted, control is delegated to the motion controller.
    Proceed,
}

/// Action requested by the gate for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    /// Preconditions to run have not been met, hold the vehicle stopped.
    Wait,

    /// The rotation matrix must be initialised now. Call
    /// [`SafetyGate::rotation_initialised`] once this succeeds.
    InitRotation,

    /// The gate is running and has made a decision.
    Decide(GateDecision),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Decide whether motion is permitted for the given switch combination.
///
/// | autonomous | rtk   | operation | decision                |
/// |------------|-------|-----------|-------------------------|
/// | false      | -     | -         | `Stop(AutonomousOff)`   |
/// | true       | false | -         | `Stop(RtkLost)`         |
/// | true       | true  | false     | `Stop(OperationOff)`    |
/// | true       | true  | true      | `Proceed`               |
pub fn decide(switches: SwitchState) -> GateDecision {
    match (
        switches.autonomous_enabled,
        switches.rtk_available,
        switches.operation_enabled,
    ) {
        (false, _, _) => GateDecision::Stop(StopCause::AutonomousOff),
        (true, false, _) => GateDecision::Stop(StopCause::RtkLost),
        (true, true, false) => GateDecision::Stop(StopCause::OperationOff),
        (true, true, true) => GateDecision::Proceed,
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwitchState {
    /// The state with every switch off, used when the switches cannot be read.
    pub fn all_off() -> Self {
        Self::default()
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self {
            state: GateState::WaitForRtk,
            last_decision: None,
        }
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the gate.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Step the gate with this cycle's switch sample.
    ///
    /// `bearing_available` shall be true if a bearing has been received from the positioning
    /// source, which is required to initialise the rotation matrix.
    pub fn step(&mut self, switches: SwitchState, bearing_available: bool) -> GateStep {
        if self.state == GateState::WaitForRtk {
            if !switches.rtk_available {
                info!(
                    "No RTK, please flip the RTK switch when RTK is available. Ensure that RTK is \
                    available before autonomous operation"
                );
                return GateStep::Wait;
            }

            info!(
                "The operator has indicated RTK is available, please switch ON autonomous mode and \
                switch ON operation"
            );
            self.state = GateState::Ready;
        }

        match self.state {
            GateState::WaitForRtk => GateStep::Wait,
            GateState::Ready => {
                // The rotation must be computed from an RTK bearing, so drop back if RTK is lost
                // before it could be.
                if !switches.rtk_available {
                    warn!("RTK switched off before the rotation matrix was initialised");
                    self.state = GateState::WaitForRtk;
                    return GateStep::Wait;
                }

                if !bearing_available {
                    info!("Waiting for a bearing from the positioning source");
                    return GateStep::Wait;
                }

                GateStep::InitRotation
            }
            GateState::Run => {
                let decision = decide(switches);
                self.log_decision(decision);
                self.last_decision = Some(decision);

                GateStep::Decide(decision)
            }
        }
    }

    /// Inform the gate that the rotation matrix has been initialised, moving it into `Run`.
    pub fn rotation_initialised(&mut self) {
        if self.state == GateState::Ready {
            info!("Rotation matrix initialised, local navigation running");
            self.state = GateState::Run;
        }
    }

    fn log_decision(&self, decision: GateDecision) {
        let changed = self.last_decision != Some(decision);

        match decision {
            GateDecision::Stop(StopCause::RtkLost) => error!(
                "Operator has indicated that RTK is not available. Ensure RTK is available \
                before switching RTK ON"
            ),
            GateDecision::Stop(StopCause::OperationOff) => {
                info!("Turn operation switch ON to begin autonomous operation")
            }
            GateDecision::Stop(StopCause::AutonomousOff) if changed => {
                info!("Autonomous mode is OFF, holding the vehicle stopped")
            }
            GateDecision::Proceed if changed => info!("Autonomous operation enabled"),
            _ => (),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sw(autonomous_enabled: bool, rtk_available: bool, operation_enabled: bool) -> SwitchState {
        SwitchState {
            rtk_available,
            operation_enabled,
            autonomous_enabled,
        }
    }

    #[test]
    fn test_decide_all_combinations() {
        use GateDecision::*;
        use StopCause::*;

        let table = [
            ((false, false, false), Stop(AutonomousOff)),
            ((false, false, true), Stop(AutonomousOff)),
            ((false, true, false), Stop(AutonomousOff)),
            ((false, true, true), Stop(AutonomousOff)),
            ((true, false, false), Stop(RtkLost)),
            ((true, false, true), Stop(RtkLost)),
            ((true, true, false), Stop(OperationOff)),
            ((true, true, true), Proceed),
        ];

        for ((auto, rtk, op), expected) in table.iter() {
            assert_eq!(
                decide(sw(*auto, *rtk, *op)),
                *expected,
                "autonomous = {}, rtk = {}, operation = {}",
                auto, rtk, op
            );
        }
    }

    #[test]
    fn test_waits_for_rtk() {
        let mut gate = SafetyGate::new();
        assert_eq!(gate.state(), GateState::WaitForRtk);

        // Other switches don't matter until RTK is indicated
        for _ in 0..3 {
            assert_eq!(gate.step(sw(true, false, true), true), GateStep::Wait);
            assert_eq!(gate.state(), GateState::WaitForRtk);
        }
    }

    #[test]
    fn test_full_sequence() {
        let mut gate = SafetyGate::new();

        assert_eq!(gate.step(sw(false, false, false), false), GateStep::Wait);

        // RTK on but no bearing yet
        assert_eq!(gate.step(sw(false, true, false), false), GateStep::Wait);
        assert_eq!(gate.state(), GateState::Ready);

        // Bearing arrives
        assert_eq!(gate.step(sw(false, true, false), true), GateStep::InitRotation);
        assert_eq!(gate.state(), GateState::Ready);

        // Until initialisation is confirmed the gate keeps asking for it
        assert_eq!(gate.step(sw(false, true, false), true), GateStep::InitRotation);

        gate.rotation_initialised();
        assert_eq!(gate.state(), GateState::Run);

        assert_eq!(
            gate.step(sw(false, true, false), true),
            GateStep::Decide(GateDecision::Stop(StopCause::AutonomousOff))
        );
        assert_eq!(
            gate.step(sw(true, true, true), true),
            GateStep::Decide(GateDecision::Proceed)
        );
        assert_eq!(
            gate.step(sw(true, false, true), true),
            GateStep::Decide(GateDecision::Stop(StopCause::RtkLost))
        );

        // No further state transitions once running
        assert_eq!(gate.state(), GateState::Run);
    }

    #[test]
    fn test_rtk_lost_while_ready() {
        let mut gate = SafetyGate::new();

        gate.step(sw(false, true, false), false);
        assert_eq!(gate.state(), GateState::Ready);

        assert_eq!(gate.step(sw(false, false, false), true), GateStep::Wait);
        assert_eq!(gate.state(), GateState::WaitForRtk);
    }

    #[test]
    fn test_rotation_initialised_ignored_outside_ready() {
        let mut gate = SafetyGate::new();
        gate.rotation_initialised();
        assert_eq!(gate.state(), GateState::WaitForRtk);
    }
}
