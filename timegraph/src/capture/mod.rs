//! Capture sessions: from a transport's event stream into the timeline
//!
//! ```text
//! CaptureTransport ──(CaptureEvent channel)──► Dispatcher thread ──► TimelineContext
//!        ▲                                            │
//!        └── start request (worker pool)              └──► CaptureData
//! ```
//!
//! [`CaptureSession`] owns the state machine ([`CaptureState`]) and the
//! control surface. The dispatcher is the only thread that calls the
//! ingestion entry points of the track store.

mod capture_data;
mod dispatcher;
mod event;
mod session;
mod state;
mod synthetic;
mod times;
mod transport;

pub use capture_data::{CaptureData, FunctionStats};
pub use event::CaptureEvent;
pub use session::CaptureSession;
pub use state::{CaptureState, StateCell};
pub use synthetic::{SyntheticConfig, SyntheticFault, SyntheticTransport};
pub use times::SessionTimes;
pub use transport::{CaptureTransport, StartRequest};
