//! Structured error types for timegraph
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// Failures that end a capture session (the session moves to `Failed`)
/// or reject a control request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Capture transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Process with pid {0} not found")]
    ProcessNotFound(i32),

    #[error("Module corresponding to process binary not found")]
    MainModuleNotFound,

    #[error("Symbols not found for {0}")]
    SymbolsNotFound(String),

    #[error("Capture session is not initialized")]
    NotInitialized,

    #[error("A capture is already in progress")]
    AlreadyCapturing,

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Capture endpoint rejected start request: {0}")]
    StartRejected(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: the capture holds no timers")]
    EmptyCapture,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
