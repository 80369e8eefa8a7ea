//! Scheduler lane: which thread ran on which core

use timegraph_common::TimerRecord;

use super::TrackCore;
use crate::storage::ChainCursor;
use crate::domain::Color;

/// Receives only `CoreActivity` timers; one row per core
#[derive(Debug)]
pub struct SchedulerTrack {
    core: TrackCore,
}

impl Default for SchedulerTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerTrack {
    #[must_use]
    pub fn new() -> Self {
        Self { core: TrackCore::new(Color::WHITE) }
    }

    #[must_use]
    pub fn core(&self) -> &TrackCore {
        &self.core
    }

    /// Rows are cores: the timer's depth becomes its processor
    pub fn on_timer(&self, cursor: &mut ChainCursor, mut record: TimerRecord) {
        record.depth = u8::try_from(record.processor.0.max(0)).unwrap_or(u8::MAX);
        self.core.on_timer(cursor, record);
    }

    #[must_use]
    pub fn label(num_cores: usize) -> String {
        format!("Scheduler ({num_cores} cores)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::{CoreId, TimerKind};

    #[test]
    fn test_rows_follow_processor() {
        let track = SchedulerTrack::new();
        let mut cursor = track.core().chain().cursor();
        for cpu in [3, 0, 3] {
            track.on_timer(&mut cursor, TimerRecord {
                start: 10,
                end: 20,
                processor: CoreId(cpu),
                kind: TimerKind::CoreActivity,
                ..TimerRecord::default()
            });
        }

        assert_eq!(track.core().num_rows(), 4);
        let depths: Vec<u8> = track.core().chain().iter().map(|t| t.depth).collect();
        assert_eq!(depths, vec![3, 0, 3]);
        assert_eq!(SchedulerTrack::label(2), "Scheduler (2 cores)");
    }
}
