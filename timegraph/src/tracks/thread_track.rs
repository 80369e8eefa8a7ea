//! Lane of one thread (or of the whole process for [`Tid::PROCESS`])

use std::sync::{PoisonError, RwLock};

use timegraph_common::{TimerKind, TimerRecord};

use super::{thread_color, EventTrack, TrackCore};
use crate::storage::ChainCursor;
use crate::domain::{Color, Tid};

#[derive(Debug)]
pub struct ThreadTrack {
    tid: Tid,
    name: RwLock<String>,
    core: TrackCore,
    event_track: EventTrack,
}

impl ThreadTrack {
    #[must_use]
    pub fn new(tid: Tid, name: impl Into<String>) -> Self {
        Self::with_core(tid, name, TrackCore::new(thread_color(tid)))
    }

    #[must_use]
    pub fn with_core(tid: Tid, name: impl Into<String>, core: TrackCore) -> Self {
        Self { tid, name: RwLock::new(name.into()), core, event_track: EventTrack::new(tid) }
    }

    #[must_use]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[must_use]
    pub fn core(&self) -> &TrackCore {
        &self.core
    }

    #[must_use]
    pub fn event_track(&self) -> &EventTrack {
        &self.event_track
    }

    /// Introspection scopes switch the whole lane to the introspection tint
    pub fn on_timer(&self, cursor: &mut ChainCursor, record: TimerRecord) {
        if record.kind == TimerKind::Introspection {
            self.core.set_color(Color::INTROSPECTION);
        }
        self.core.on_timer(cursor, record);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.event_track.is_empty()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.into();
    }

    /// `"<name> [<tid>]"`, or `"<process> (all threads)"` for the process lane
    #[must_use]
    pub fn label(&self, process_name: &str) -> String {
        if self.tid.is_process() {
            format!("{process_name} (all threads)")
        } else {
            format!("{} [{}]", self.name(), self.tid.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let track = ThreadTrack::new(Tid(42), "worker");
        assert_eq!(track.label("app"), "worker [42]");

        track.set_name("renamed");
        assert_eq!(track.label("app"), "renamed [42]");

        let process = ThreadTrack::new(Tid::PROCESS, "");
        assert_eq!(process.label("app"), "app (all threads)");
    }

    #[test]
    fn test_introspection_tint() {
        let track = ThreadTrack::new(Tid(5), "main");
        assert_eq!(track.core().color(), thread_color(Tid(5)));

        let mut cursor = track.core().chain().cursor();
        track.on_timer(&mut cursor, TimerRecord { kind: TimerKind::Introspection, ..TimerRecord::default() });
        assert_eq!(track.core().color(), Color::INTROSPECTION);
    }

    #[test]
    fn test_empty_until_timer_or_sample() {
        let track = ThreadTrack::new(Tid(1), "t");
        assert!(track.is_empty());

        track.event_track().record_event();
        assert!(!track.is_empty());
        assert!(track.core().is_empty());
    }
}
