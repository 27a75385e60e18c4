//! # Stop signal handling
//!
//! The control loop runs until the process is asked to stop. SIGINT (Ctrl-C), SIGTERM (sent by
//! service managers) and SIGHUP all clear the same running flag, so the loop exits normally and
//! the vehicle is stopped and the switches released on the way out.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Install the stop handler and return the running flag it clears.
///
/// Can only be called once per process.
pub fn install_stop_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));

    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    Ok(running)
}
