//! Cyclic module interface
//!
//! A cyclic module is initialised once from its parameter file, then processed once per control
//! loop cycle. Modules which keep archives also implement [`crate::archive::Archived`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// State of a cyclic module.
pub trait State {
    /// Data needed to initialise the module, typically a parameter file path.
    type InitData;
    type InitError;

    /// Data consumed on each cycle.
    type InputData;

    /// Data produced on each cycle.
    type OutputData;

    /// Summary of what the module did on a cycle.
    type StatusReport;
    type ProcError;

    /// Initialise the module, opening any archives inside the session.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
