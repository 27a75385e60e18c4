//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to or recieved from equipment
//! publishers and subscribers.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod nav;
