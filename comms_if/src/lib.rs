//! # Communications interface crate.
//!
//! Provides the message definitions and network plumbing shared by the navigation executable
//! and the tools which talk to the simulation.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Grid cell coordinates
pub mod cell;

/// Telemetry and command messages exchanged with the simulation
pub mod msg;

/// Network module
pub mod net;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use cell::Cell;
