//! NetShield agent library.
//!
//! The binary in `main.rs` wires these together; tests drive them directly
//! with fake capabilities.

pub mod config;
pub mod monitor;
pub mod probe;
pub mod score;
pub mod status;
pub mod telemetry;
pub mod wifi;
