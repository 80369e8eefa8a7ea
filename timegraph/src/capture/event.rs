//! Tagged events streamed from a transport to the session dispatcher

use timegraph_common::{
    AddressInfo, CallStack, CallstackEvent, ThreadName, TimerRecord, TracepointEvent, TracepointInfo,
};

/// Everything a capture endpoint can deliver, in stream order
///
/// A stream starts with `CaptureStarted` and ends with exactly one of
/// `CaptureComplete`, `CaptureCancelled` or `CaptureFailed`.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The endpoint acknowledged the start request
    CaptureStarted,
    Timer(TimerRecord),
    KeyAndString { key: u64, value: String },
    UniqueCallStack(CallStack),
    CallstackEvent(CallstackEvent),
    ThreadName(ThreadName),
    AddressInfo(AddressInfo),
    TracepointInfo { key: u64, info: TracepointInfo },
    TracepointEvent(TracepointEvent),
    /// Stop acknowledged; nothing follows
    CaptureComplete,
    CaptureCancelled,
    CaptureFailed(String),
}

impl CaptureEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureEvent::CaptureStarted => "capture-started",
            CaptureEvent::Timer(_) => "timer",
            CaptureEvent::KeyAndString { .. } => "key-and-string",
            CaptureEvent::UniqueCallStack(_) => "unique-callstack",
            CaptureEvent::CallstackEvent(_) => "callstack-event",
            CaptureEvent::ThreadName(_) => "thread-name",
            CaptureEvent::AddressInfo(_) => "address-info",
            CaptureEvent::TracepointInfo { .. } => "tracepoint-info",
            CaptureEvent::TracepointEvent(_) => "tracepoint-event",
            CaptureEvent::CaptureComplete => "capture-complete",
            CaptureEvent::CaptureCancelled => "capture-cancelled",
            CaptureEvent::CaptureFailed(_) => "capture-failed",
        }
    }

    /// Returns true for the events that end a stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureEvent::CaptureComplete | CaptureEvent::CaptureCancelled | CaptureEvent::CaptureFailed(_)
        )
    }
}
