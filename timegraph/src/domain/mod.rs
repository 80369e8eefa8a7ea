//! Domain model for timegraph
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype ids (shared with the transport crate)
//! - Small value enums used across tracks, navigation and rendering
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    pretty_time, CallstackId, Color, CoreId, JumpDirection, JumpScope, PickingMode, Tid, ZoomDirection,
};

pub use errors::{ExportError, SessionError};
