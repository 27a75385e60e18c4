//! # Navigation library.
//!
//! Local navigation control of the UGV. The library provides the modules used by the `nav_exec`
//! executable, allowing them to be tested without any hardware or network.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Clock abstraction used to time the control loop
pub mod clock;

/// Goal resolver - projects displacement reports into goal poses
pub mod goal_resolver;

/// Hardware interface - operator switches and the motor command sink
pub mod hw_if;

/// Input client - receives poses and displacement reports
pub mod input_client;

/// Motion control - bang-bang steering towards the goal
pub mod motion_ctrl;

/// Motor client - publishes demands to the motor driver
pub mod motor_client;

/// Navigation control - the per-cycle navigation module
pub mod nav_ctrl;

/// Executable parameters
pub mod params;

/// Pose tracker - holds the latest odometry pose
pub mod pose_tracker;

/// Control loop runner
pub mod runner;

/// Safety gate - decides from the operator switches whether the vehicle may move
pub mod safety_gate;

/// Stop signal handling
pub mod signal;
