//! Lane of one GPU timeline

use timegraph_common::TimerRecord;

use super::{thread_color, TrackCore};
use crate::storage::ChainCursor;
use crate::domain::Color;
use crate::string_table::StringTable;

pub const SW_QUEUE_STAGE: &str = "sw queue";
pub const HW_QUEUE_STAGE: &str = "hw queue";
pub const HW_EXECUTION_STAGE: &str = "hw execution";

/// Alpha of timers on even depths; odd depths stay opaque
const EVEN_DEPTH_ALPHA: u8 = 210;

/// Keyed by the timeline hash carried in the timers' user data
#[derive(Debug)]
pub struct GpuTrack {
    timeline_hash: u64,
    core: TrackCore,
}

impl GpuTrack {
    #[must_use]
    pub fn new(timeline_hash: u64) -> Self {
        Self { timeline_hash, core: TrackCore::new(Color::WHITE) }
    }

    #[must_use]
    pub fn timeline_hash(&self) -> u64 {
        self.timeline_hash
    }

    #[must_use]
    pub fn core(&self) -> &TrackCore {
        &self.core
    }

    pub fn on_timer(&self, cursor: &mut ChainCursor, record: TimerRecord) {
        self.core.on_timer(cursor, record);
    }

    /// Timeline name from the string table, empty until announced
    #[must_use]
    pub fn label(&self, strings: &StringTable) -> String {
        strings.get_or_empty(self.timeline_hash)
    }

    /// Submitting thread's color, darkened by stage so queued and executing
    /// work can be told apart
    #[must_use]
    pub fn timer_color(&self, timer: &TimerRecord, strings: &StringTable) -> Color {
        let coeff = match strings.get(timer.gpu_stage_key()).as_deref() {
            Some(SW_QUEUE_STAGE) => 0.5,
            Some(HW_QUEUE_STAGE) => 0.75,
            _ => 1.0,
        };
        let color = thread_color(timer.tid).scaled(coeff);
        if timer.depth % 2 == 0 {
            color.with_alpha(EVEN_DEPTH_ALPHA)
        } else {
            color
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::{Tid, TimerKind};

    fn gpu_timer(stage_key: u64, depth: u8) -> TimerRecord {
        TimerRecord {
            tid: Tid(7),
            depth,
            kind: TimerKind::GpuActivity,
            user_data: [stage_key, 0xfeed],
            ..TimerRecord::default()
        }
    }

    #[test]
    fn test_label_resolved_on_demand() {
        let strings = StringTable::new();
        let track = GpuTrack::new(0xfeed);
        assert_eq!(track.label(&strings), "");

        strings.add_if_not_present(0xfeed, "gfx");
        assert_eq!(track.label(&strings), "gfx");
    }

    #[test]
    fn test_stage_colors() {
        let strings = StringTable::new();
        strings.add_if_not_present(1, SW_QUEUE_STAGE);
        strings.add_if_not_present(2, HW_QUEUE_STAGE);
        strings.add_if_not_present(3, HW_EXECUTION_STAGE);
        let track = GpuTrack::new(0xfeed);
        let base = thread_color(Tid(7));

        assert_eq!(track.timer_color(&gpu_timer(1, 1), &strings), base.scaled(0.5));
        assert_eq!(track.timer_color(&gpu_timer(2, 1), &strings), base.scaled(0.75));
        assert_eq!(track.timer_color(&gpu_timer(3, 1), &strings), base);
        assert_eq!(track.timer_color(&gpu_timer(3, 0), &strings).a, EVEN_DEPTH_ALPHA);
    }
}
