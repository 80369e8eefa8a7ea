//! Capture session state machine
//!
//! ```text
//! Idle ──► Initialized ──► Capturing ──┬──► Completed ──► Idle
//!   │           │              │       └──► Cancelled
//!   └───────────┴──────────────┴──────────► Failed(message)
//! ```

use std::fmt;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::info;

use crate::domain::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Transport connected, process and symbols resolved
    Initialized,
    /// Start acknowledged by the capture endpoint; events are streaming
    Capturing,
    /// Stop acknowledged and stream drained
    Completed,
    /// Stopped by external cancellation
    Cancelled,
    Failed(String),
}

impl CaptureState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "Idle",
            CaptureState::Initialized => "Initialized",
            CaptureState::Capturing => "Capturing",
            CaptureState::Completed => "Completed",
            CaptureState::Cancelled => "Cancelled",
            CaptureState::Failed(_) => "Failed",
        }
    }

    /// The session ended and no more events will be ingested
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, CaptureState::Completed | CaptureState::Cancelled | CaptureState::Failed(_))
    }

    #[must_use]
    pub fn can_transition_to(&self, next: &CaptureState) -> bool {
        use CaptureState::{Cancelled, Capturing, Completed, Failed, Idle, Initialized};
        match (self, next) {
            (Idle | Initialized | Capturing, Failed(_))
            | (Idle, Initialized)
            | (Initialized, Capturing)
            | (Capturing, Completed | Cancelled)
            | (Completed, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Failed(message) => write!(f, "Failed: {message}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Session state shared by the control surface and the delivery thread
#[derive(Debug, Default)]
pub struct StateCell {
    state: Mutex<CaptureState>,
    changed: Condvar,
}

impl StateCell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> CaptureState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Move to `next` if the edge exists
    pub fn transition(&self, next: CaptureState) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(&next) {
            return Err(SessionError::InvalidTransition { from: state.name(), to: next.name() });
        }
        info!("Capture session: {} -> {}", state.name(), next);
        *state = next;
        self.changed.notify_all();
        Ok(())
    }

    /// Block until `done` holds or `timeout` elapses; returns the last state seen
    pub fn wait_until<F>(&self, timeout: Duration, done: F) -> CaptureState
    where
        F: Fn(&CaptureState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !done(&state) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            state = self.changed.wait_timeout(state, remaining).unwrap_or_else(PoisonError::into_inner).0;
        }
        state.clone()
    }
}
