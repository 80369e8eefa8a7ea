//! Timeline lanes
//!
//! A [`Track`] is one lane of the timeline: a thread, a GPU timeline or the
//! scheduler (one row per core). Every variant shares a [`TrackCore`] that
//! owns the lane's [`TimerChain`] and its running aggregates.
//!
//! ## Ownership
//!
//! Tracks are created by the track store (`time_graph::TrackStore`), keyed by
//! [`TrackKey`], and only ever referred to by that key from the outside.
//! Appends come from the delivery thread, through the chain cursor the store
//! keeps under its coarse lock; queries and drawing come from the
//! presentation thread. Neither blocks the other: the chain is lock-free for
//! readers and the aggregates are atomics.

pub mod event_track;
pub mod gpu_track;
pub mod scheduler_track;
pub mod thread_track;

pub use event_track::EventTrack;
pub use gpu_track::GpuTrack;
pub use scheduler_track::SchedulerTrack;
pub use thread_track::ThreadTrack;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use timegraph_common::{CallstackEvent, TimerRecord};

use crate::config::Layout;
use crate::domain::{Color, PickingMode, Tid};
use crate::storage::{ChainCursor, TimerChain};
use crate::string_table::StringTable;
use crate::time_graph::primitives::{z, PickTarget, PrimitiveBatch, Rect};
use crate::time_graph::Viewport;

/// Color of selected timers
pub const SELECTION_COLOR: Color = Color::rgb(0, 128, 255);

const LABEL_COLOR: Color = Color::WHITE;

const THREAD_PALETTE: [Color; 16] = [
    Color::rgb(231, 68, 53),
    Color::rgb(43, 145, 175),
    Color::rgb(185, 117, 181),
    Color::rgb(87, 166, 74),
    Color::rgb(215, 171, 105),
    Color::rgb(248, 101, 22),
    Color::rgb(102, 102, 255),
    Color::rgb(0, 167, 157),
    Color::rgb(205, 97, 136),
    Color::rgb(255, 196, 0),
    Color::rgb(132, 96, 220),
    Color::rgb(98, 186, 212),
    Color::rgb(211, 84, 0),
    Color::rgb(142, 195, 102),
    Color::rgb(196, 78, 82),
    Color::rgb(76, 114, 176),
];

/// Stable color of a thread, shared by every lane showing its work
#[must_use]
pub fn thread_color(tid: Tid) -> Color {
    THREAD_PALETTE[tid.0.unsigned_abs() as usize % THREAD_PALETTE.len()]
}

/// Identity of a track in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKey {
    Scheduler,
    /// GPU timeline hash
    Gpu(u64),
    Thread(Tid),
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Scheduler => write!(f, "scheduler"),
            TrackKey::Gpu(hash) => write!(f, "gpu:{hash:016x}"),
            TrackKey::Thread(tid) => write!(f, "{tid}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Thread,
    Gpu,
    Scheduler,
}

/// Per-frame inputs shared by every track while drawing
pub struct DrawContext<'a> {
    pub viewport: &'a Viewport,
    pub layout: &'a Layout,
    pub picking: PickingMode,
    pub strings: &'a StringTable,
    /// Timers highlighted with [`SELECTION_COLOR`]
    pub selected_timers: &'a [TimerRecord],
    /// Visible samples per thread (the process lane holds all of them)
    pub samples: &'a BTreeMap<Tid, Vec<CallstackEvent>>,
    /// Selected samples, keyed by `(time, tid)`
    pub selected_samples: &'a HashSet<(u64, Tid)>,
    /// Distinct cores seen so far (scheduler label)
    pub num_cores: usize,
    /// Process name (process lane label)
    pub process_name: &'a str,
}

// =============================================================================
// TRACK CORE
// =============================================================================

/// State shared by every track variant
#[derive(Debug)]
pub struct TrackCore {
    chain: TimerChain,
    max_time: AtomicU64,
    max_depth: AtomicU8,
    color: AtomicU32,
}

impl TrackCore {
    #[must_use]
    pub fn new(color: Color) -> Self {
        Self::with_chain(TimerChain::new(), color)
    }

    #[must_use]
    pub fn with_chain(chain: TimerChain, color: Color) -> Self {
        Self {
            chain,
            max_time: AtomicU64::new(0),
            max_depth: AtomicU8::new(0),
            color: AtomicU32::new(color.to_u32()),
        }
    }

    /// Append a timer and update the running aggregates
    pub fn on_timer(&self, cursor: &mut ChainCursor, record: TimerRecord) {
        self.max_time.fetch_max(record.end, Ordering::AcqRel);
        self.max_depth.fetch_max(record.depth, Ordering::AcqRel);
        self.chain.append(cursor, record);
    }

    #[must_use]
    pub fn chain(&self) -> &TimerChain {
        &self.chain
    }

    #[must_use]
    pub fn num_timers(&self) -> u64 {
        self.chain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Earliest start tick, recomputed from the chain
    #[must_use]
    pub fn min_time(&self) -> Option<u64> {
        self.chain.min_tick()
    }

    /// Latest end tick seen so far
    #[must_use]
    pub fn max_time(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.max_time.load(Ordering::Acquire))
    }

    /// Number of timer rows (deepest depth + 1)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            usize::from(self.max_depth.load(Ordering::Acquire)) + 1
        }
    }

    #[must_use]
    pub fn color(&self) -> Color {
        Color::from_u32(self.color.load(Ordering::Acquire))
    }

    pub fn set_color(&self, color: Color) {
        self.color.store(color.to_u32(), Ordering::Release);
    }

    /// Timers overlapping `[min_tick, max_tick]`, in arrival order
    #[must_use]
    pub fn timers_in_range(&self, min_tick: u64, max_tick: u64) -> Vec<TimerRecord> {
        self.chain.query(min_tick, max_tick)
    }

    // =========================================================================
    // Directional neighbors
    // =========================================================================

    /// Closest timer at the same depth starting strictly before `reference`
    #[must_use]
    pub fn get_left(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        let max_tick = reference.start.checked_sub(1)?;
        self.chain.find_nearest(0, max_tick, |t| {
            (t.depth == reference.depth && t.start < reference.start).then(|| reference.start - t.start)
        })
    }

    /// Closest timer at the same depth starting strictly after `reference`
    #[must_use]
    pub fn get_right(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        let min_tick = reference.start.checked_add(1)?;
        self.chain.find_nearest(min_tick, u64::MAX, |t| {
            (t.depth == reference.depth && t.start > reference.start).then(|| t.start - reference.start)
        })
    }

    /// Closest timer one level up starting at or before `reference`
    #[must_use]
    pub fn get_up(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        let depth = reference.depth.checked_sub(1)?;
        self.chain.find_nearest(0, reference.start, |t| {
            (t.depth == depth && t.start <= reference.start).then(|| reference.start - t.start)
        })
    }

    /// Closest timer one level down starting at or after `reference`
    #[must_use]
    pub fn get_down(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        let depth = reference.depth.checked_add(1)?;
        self.chain.find_nearest(reference.start, u64::MAX, |t| {
            (t.depth == depth && t.start >= reference.start).then(|| t.start - reference.start)
        })
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Emit the visible timers as boxes, or as lines when narrower than a pixel
    ///
    /// Only one sub-pixel line is emitted per pixel column and row.
    pub fn draw_timers<F>(&self, batch: &mut PrimitiveBatch, ctx: &DrawContext<'_>, top: f32, color_of: F)
    where
        F: Fn(&TimerRecord) -> Color,
    {
        let viewport = ctx.viewport;
        if viewport.current_time_span_us() <= 0.0 {
            return;
        }
        let (min_tick, max_tick) = viewport.visible_ticks();
        let pixel = viewport.world_units_per_pixel();
        let origin_x = viewport.world().x;
        let row_height = ctx.layout.text_box_height;

        let mut last_column: HashMap<u8, i64> = HashMap::new();
        for timer in self.chain.blocks().filter(|b| b.intersects(min_tick, max_tick)).flat_map(|b| b.iter()) {
            if !timer.overlaps(min_tick, max_tick) {
                continue;
            }
            let x0 = viewport.world_from_tick(timer.start);
            let x1 = viewport.world_from_tick(timer.end);
            let y = top + f32::from(timer.depth) * row_height;

            let color = if ctx.selected_timers.contains(timer) { SELECTION_COLOR } else { color_of(timer) };
            let target = Some(PickTarget::Timer(*timer));

            if x1 - x0 < pixel {
                #[allow(clippy::cast_possible_truncation)]
                let column = ((x0 - origin_x) / pixel).floor() as i64;
                if last_column.insert(timer.depth, column) == Some(column) {
                    continue;
                }
                batch.add_vertical_line(x0, y, row_height, z::TIMER, color, target);
            } else {
                batch.add_box(Rect::new(x0, y, x1 - x0, row_height), z::TIMER, color, target);
            }
        }
    }
}

// =============================================================================
// TRACK
// =============================================================================

/// One lane of the timeline
#[derive(Debug)]
pub enum Track {
    Thread(ThreadTrack),
    Gpu(GpuTrack),
    Scheduler(SchedulerTrack),
}

impl Track {
    #[must_use]
    pub fn key(&self) -> TrackKey {
        match self {
            Track::Thread(track) => TrackKey::Thread(track.tid()),
            Track::Gpu(track) => TrackKey::Gpu(track.timeline_hash()),
            Track::Scheduler(_) => TrackKey::Scheduler,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        match self {
            Track::Thread(_) => TrackKind::Thread,
            Track::Gpu(_) => TrackKind::Gpu,
            Track::Scheduler(_) => TrackKind::Scheduler,
        }
    }

    #[must_use]
    pub fn core(&self) -> &TrackCore {
        match self {
            Track::Thread(track) => track.core(),
            Track::Gpu(track) => track.core(),
            Track::Scheduler(track) => track.core(),
        }
    }

    pub fn on_timer(&self, cursor: &mut ChainCursor, record: TimerRecord) {
        match self {
            Track::Thread(track) => track.on_timer(cursor, record),
            Track::Gpu(track) => track.on_timer(cursor, record),
            Track::Scheduler(track) => track.on_timer(cursor, record),
        }
    }

    #[must_use]
    pub fn num_timers(&self) -> u64 {
        self.core().num_timers()
    }

    /// A thread lane with samples but no timers is not empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Track::Thread(track) => track.is_empty(),
            _ => self.core().is_empty(),
        }
    }

    #[must_use]
    pub fn min_time(&self) -> Option<u64> {
        self.core().min_time()
    }

    #[must_use]
    pub fn max_time(&self) -> Option<u64> {
        self.core().max_time()
    }

    #[must_use]
    pub fn get_left(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        self.core().get_left(reference)
    }

    #[must_use]
    pub fn get_right(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        self.core().get_right(reference)
    }

    #[must_use]
    pub fn get_up(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        self.core().get_up(reference)
    }

    #[must_use]
    pub fn get_down(&self, reference: &TimerRecord) -> Option<TimerRecord> {
        self.core().get_down(reference)
    }

    #[must_use]
    pub fn as_thread(&self) -> Option<&ThreadTrack> {
        match self {
            Track::Thread(track) => Some(track),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self, strings: &StringTable, num_cores: usize, process_name: &str) -> String {
        match self {
            Track::Thread(track) => track.label(process_name),
            Track::Gpu(track) => track.label(strings),
            Track::Scheduler(_) => SchedulerTrack::label(num_cores),
        }
    }

    /// Height the track occupies in world units
    #[must_use]
    pub fn height(&self, layout: &Layout) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let rows = self.core().num_rows() as f32;
        let events = match self {
            Track::Thread(_) => layout.event_track_height,
            _ => 0.0,
        };
        layout.track_label_height + events + rows * layout.text_box_height + layout.track_bottom_margin
    }

    /// Emit label, sampled events and timers starting at `top`; returns the height used
    pub fn draw(&self, batch: &mut PrimitiveBatch, ctx: &DrawContext<'_>, top: f32) -> f32 {
        let world = ctx.viewport.world();
        let height = self.height(ctx.layout);

        if !ctx.picking.is_picking() {
            let label = self.label(ctx.strings, ctx.num_cores, ctx.process_name);
            let rect = Rect::new(world.x, top, world.width, ctx.layout.track_label_height);
            batch.add_label(rect, z::LABEL, label, LABEL_COLOR, Some(PickTarget::Track(self.key())));
        }

        let mut timers_top = top + ctx.layout.track_label_height;
        match self {
            Track::Thread(track) => {
                let strip = Rect::new(world.x, timers_top, world.width, ctx.layout.event_track_height);
                track.event_track().draw(batch, ctx, strip);
                timers_top += ctx.layout.event_track_height;
                track.core().draw_timers(batch, ctx, timers_top, |_| track.core().color());
            }
            Track::Gpu(track) => {
                track.core().draw_timers(batch, ctx, timers_top, |t| track.timer_color(t, ctx.strings));
            }
            Track::Scheduler(track) => {
                track.core().draw_timers(batch, ctx, timers_top, |t| thread_color(t.tid));
            }
        }
        height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(start: u64, end: u64, depth: u8) -> TimerRecord {
        TimerRecord { start, end, depth, function_address: 0x10, ..TimerRecord::default() }
    }

    fn core_with(timers: &[TimerRecord]) -> TrackCore {
        let core = TrackCore::with_chain(TimerChain::with_block_capacity(2), Color::WHITE);
        let mut cursor = core.chain().cursor();
        for t in timers {
            core.on_timer(&mut cursor, *t);
        }
        core
    }

    #[test]
    fn test_on_timer_updates_aggregates() {
        let core = core_with(&[timer(10, 20, 0), timer(5, 50, 2)]);
        assert_eq!(core.num_timers(), 2);
        assert_eq!(core.min_time(), Some(5));
        assert_eq!(core.max_time(), Some(50));
        assert_eq!(core.num_rows(), 3);
    }

    #[test]
    fn test_left_right_same_depth() {
        // Out of start order on purpose
        let core = core_with(&[timer(300, 350, 0), timer(100, 150, 0), timer(200, 250, 0), timer(210, 220, 1)]);
        let reference = timer(200, 250, 0);

        assert_eq!(core.get_left(&reference), Some(timer(100, 150, 0)));
        assert_eq!(core.get_right(&reference), Some(timer(300, 350, 0)));
        assert_eq!(core.get_left(&timer(100, 150, 0)), None);
        assert_eq!(core.get_right(&timer(300, 350, 0)), None);
    }

    #[test]
    fn test_up_down() {
        let core = core_with(&[timer(0, 100, 0), timer(10, 40, 1), timer(50, 90, 1), timer(12, 20, 2)]);

        assert_eq!(core.get_up(&timer(12, 20, 2)), Some(timer(10, 40, 1)));
        assert_eq!(core.get_up(&timer(50, 90, 1)), Some(timer(0, 100, 0)));
        assert_eq!(core.get_down(&timer(0, 100, 0)), Some(timer(10, 40, 1)));
        assert_eq!(core.get_down(&timer(10, 40, 1)), Some(timer(12, 20, 2)));
        assert_eq!(core.get_up(&timer(0, 100, 0)), None);
    }

    #[test]
    fn test_thread_palette_is_stable() {
        assert_eq!(thread_color(Tid(3)), thread_color(Tid(3)));
        assert_eq!(thread_color(Tid(1)), thread_color(Tid(17)));
        assert_ne!(thread_color(Tid(1)), thread_color(Tid(2)));
    }

    #[test]
    fn test_track_key_order() {
        let mut keys = vec![TrackKey::Thread(Tid(1)), TrackKey::Gpu(5), TrackKey::Scheduler];
        keys.sort();
        assert_eq!(keys, vec![TrackKey::Scheduler, TrackKey::Gpu(5), TrackKey::Thread(Tid(1))]);
    }
}
