//! Parameters structure for MotionCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- THRESHOLDS ----

    /// Heading errors with a magnitude below this are driven out straight, larger errors are
    /// turned out in place.
    ///
    /// Units: degrees
    pub heading_threshold_deg: f64,

    /// The vehicle drives towards the goal while it is at least this far away.
    ///
    /// Units: meters
    pub distance_threshold_m: f64,

    // ---- SPEEDS ----

    /// Speed magnitude used on both sides when driving straight.
    pub straight_speed: u8,

    /// Speed magnitude used on both sides when turning in place.
    pub turn_speed: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            heading_threshold_deg: 4.0,
            distance_threshold_m: 0.2,
            straight_speed: 37,
            turn_speed: 15,
        }
    }
}
