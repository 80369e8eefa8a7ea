//! Sampled-event strip of a thread lane

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use timegraph_common::CallstackEvent;

use super::DrawContext;
use crate::domain::{Color, Tid};
use crate::sampling::profiler::UNKNOWN_FUNCTION_NAME;
use crate::sampling::CallstackStore;
use crate::time_graph::primitives::{z, PickTarget, PrimitiveBatch, Rect};

const SAMPLE_COLOR: Color = Color::rgba(255, 255, 255, 180);
const SELECTED_SAMPLE_COLOR: Color = Color::GREEN;

/// Width of a sample's picking box, in pixels
const PICKING_BOX_WIDTH_PX: f32 = 9.0;

/// One vertical line per sample of its thread
///
/// The samples themselves live in the track store's event buffer; the strip
/// only counts them and turns the visible ones into primitives.
#[derive(Debug)]
pub struct EventTrack {
    tid: Tid,
    num_events: AtomicU64,
}

impl EventTrack {
    #[must_use]
    pub fn new(tid: Tid) -> Self {
        Self { tid, num_events: AtomicU64::new(0) }
    }

    pub fn record_event(&self) {
        self.num_events.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn num_events(&self) -> u64 {
        self.num_events.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_events() == 0
    }

    pub fn draw(&self, batch: &mut PrimitiveBatch, ctx: &DrawContext<'_>, strip: Rect) {
        let Some(samples) = ctx.samples.get(&self.tid) else {
            return;
        };
        let (min_tick, max_tick) = ctx.viewport.visible_ticks();
        let box_width = PICKING_BOX_WIDTH_PX * ctx.viewport.world_units_per_pixel();

        for event in samples.iter().filter(|e| e.time >= min_tick && e.time <= max_tick) {
            let x = ctx.viewport.world_from_tick(event.time);
            let target = Some(PickTarget::Sample(*event));
            if ctx.picking.is_picking() {
                let rect = Rect::new(x - box_width / 2.0, strip.y, box_width, strip.height);
                batch.add_box(rect, z::EVENT, SAMPLE_COLOR, target);
            } else {
                let selected = ctx.selected_samples.contains(&(event.time, event.tid));
                let color = if selected { SELECTED_SAMPLE_COLOR } else { SAMPLE_COLOR };
                batch.add_vertical_line(x, strip.y, strip.height, z::EVENT, color, target);
            }
        }
    }

    /// Tooltip of a sample: innermost function, then every frame
    ///
    /// `function_name` resolves an absolute address; unknown frames show as
    /// `???`.
    #[must_use]
    pub fn tooltip<F>(event: &CallstackEvent, callstacks: &CallstackStore, function_name: F) -> String
    where
        F: Fn(u64) -> Option<String>,
    {
        let Some(callstack) = callstacks.get(event.callstack_id) else {
            return format!("Unknown callstack {}", event.callstack_id);
        };
        let name_of = |address: u64| function_name(address).unwrap_or_else(|| UNKNOWN_FUNCTION_NAME.to_string());

        let mut tooltip = String::new();
        if let Some(top) = callstack.top_frame() {
            let _ = writeln!(tooltip, "{}", name_of(top));
        }
        let _ = writeln!(tooltip, "Sampled event");
        for frame in &callstack.frames {
            let _ = writeln!(tooltip, "  {} ({frame:#x})", name_of(*frame));
        }
        tooltip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::{CallStack, CallstackId};

    #[test]
    fn test_counts_events() {
        let track = EventTrack::new(Tid(3));
        assert!(track.is_empty());
        track.record_event();
        track.record_event();
        assert_eq!(track.num_events(), 2);
    }

    #[test]
    fn test_tooltip_lists_frames() {
        let store = CallstackStore::new();
        let id = store.add_unique(CallStack::new(vec![0x10, 0x20], Tid(3)));
        let event = CallstackEvent { time: 5, tid: Tid(3), callstack_id: id };

        let tooltip = EventTrack::tooltip(&event, &store, |address| (address == 0x10).then(|| "leaf".to_string()));
        let lines: Vec<&str> = tooltip.lines().collect();
        assert_eq!(lines, vec!["leaf", "Sampled event", "  leaf (0x10)", "  ??? (0x20)"]);
    }

    #[test]
    fn test_tooltip_unknown_callstack() {
        let store = CallstackStore::new();
        let event = CallstackEvent { time: 5, tid: Tid(3), callstack_id: CallstackId(1) };
        assert!(EventTrack::tooltip(&event, &store, |_| None).starts_with("Unknown callstack"));
    }
}
