//! Shared types for the NetShield platform.
//!
//! This crate contains:
//! - **Protocol messages** — WebSocket envelope and payloads exchanged between
//!   the agent and the collector
//! - **Data models** — collector-side rows served by the status query surface

pub mod models;
pub mod protocol;
