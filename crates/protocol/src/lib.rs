//! Wire types for CDP trace capture and profiler handoff.
//!
//! This crate contains the serde-serializable types exchanged with a
//! Chromium browser over the DevTools protocol, plus the small message
//! vocabulary spoken with the profiler page that receives a finished trace.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Field names match the CDP JSON shapes
//! * Stable: Changes only when the wire protocol changes
//!
//! Session logic and transfer scheduling live in `pw-trace`.

pub mod cdp;
pub mod host;
pub mod target;
pub mod trace;

pub use cdp::*;
pub use host::*;
pub use target::*;
pub use trace::*;

/// Protocol version requested when attaching to a target.
pub const PROTOCOL_VERSION: &str = "1.3";
