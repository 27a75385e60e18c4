//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the navigation software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for equipment (odometry, positioning, motor driver)
pub mod eqpt;

/// Network module
pub mod net;
