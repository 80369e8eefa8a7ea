//! Seam between a capture session and the endpoint that produces events

use crossbeam_channel::Sender;
use timegraph_common::{FunctionInfo, ModuleInfo, ProcessInfo, TracepointInfo};

use super::CaptureEvent;
use crate::domain::SessionError;

/// What the endpoint is asked to record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub pid: i32,
    /// Functions to instrument, with absolute addresses resolved
    pub selected_functions: Vec<FunctionInfo>,
    pub selected_tracepoints: Vec<TracepointInfo>,
}

/// A capture endpoint (local tracer, remote service, or a synthetic source)
///
/// Every method except [`start_capture`](CaptureTransport::start_capture)
/// returns promptly. `stop_capture` and `cancel` are called from the control
/// thread while `start_capture` runs on a worker.
pub trait CaptureTransport: Send + Sync {
    /// Open the connection to the endpoint
    fn connect(&self) -> Result<(), SessionError>;

    fn list_processes(&self) -> Result<Vec<ProcessInfo>, SessionError>;

    fn list_modules(&self, pid: i32) -> Result<Vec<ModuleInfo>, SessionError>;

    /// Locate the symbol file of `module`
    fn find_debug_info(&self, module: &ModuleInfo) -> Result<String, SessionError>;

    /// Load the functions of a symbol file, load bias applied
    fn load_symbols(&self, symbols_path: &str) -> Result<Vec<FunctionInfo>, SessionError>;

    /// Stream the capture into `events`, blocking until stopped
    ///
    /// The stream starts with [`CaptureEvent::CaptureStarted`] and ends with
    /// one terminal event. Returning an error before the terminal event
    /// fails the session.
    fn start_capture(&self, request: StartRequest, events: Sender<CaptureEvent>) -> Result<(), SessionError>;

    /// Ask for a graceful stop; the stream ends with `CaptureComplete`
    fn stop_capture(&self);

    /// Abandon the capture; the stream ends with `CaptureCancelled`
    fn cancel(&self);
}
