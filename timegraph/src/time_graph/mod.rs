//! # Timeline Orchestrator
//!
//! [`TimeGraph`] is the presentation-side view of a capture: it owns the
//! viewport, the display order of the tracks, the current selection and the
//! primitives of the last frame. The tracks themselves live in the shared
//! [`TrackStore`], which the delivery thread fills concurrently.
//!
//! ## Frame Cycle
//!
//! ```text
//! poll_needs_update()            ← set by every ingested record
//!     │
//!     ▼
//! update_primitives(world, px, picking)
//!     ├── viewport ← capture extent
//!     ├── sort_tracks_if_needed()   (≤ once per reorder interval while capturing)
//!     ├── per track: label, sampled events, timers
//!     └── selection overlay
//! ```

pub mod navigation;
pub mod primitives;
pub mod sort;
pub mod store;
pub mod viewport;

pub use primitives::{PickTarget, PickingId, Primitive, PrimitiveBatch, Rect};
pub use store::TrackStore;
pub use viewport::Viewport;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use timegraph_common::{CallstackEvent, TimerRecord};

use crate::config::TimeGraphConfig;
use crate::context::TimelineContext;
use crate::domain::{pretty_time, Color, JumpDirection, JumpScope, PickingMode, Tid, ZoomDirection};
use crate::sampling::{SamplingProfiler, SamplingReport};
use crate::tracks::{DrawContext, EventTrack, TrackKey, TrackKind};

/// Fraction of the window between a jump target and the edge it came from
const JUMP_VIEW_DISTANCE: f64 = 0.3;

const OVERLAY_COLOR: Color = Color::rgba(255, 255, 255, 120);

/// Receives the report of every non-empty sample selection
pub trait ReportSink: Send + Sync {
    fn publish_selection_report(&self, report: SamplingReport);
}

pub struct TimeGraph {
    config: TimeGraphConfig,
    ctx: TimelineContext,
    report_sink: Option<Arc<dyn ReportSink>>,

    viewport: Viewport,
    sorted_tracks: Vec<TrackKey>,
    thread_filter: String,
    last_reorder: Option<Instant>,

    selected_timers: Vec<TimerRecord>,
    selected_callstack_events: BTreeMap<Tid, Vec<CallstackEvent>>,

    batch: PrimitiveBatch,
}

impl TimeGraph {
    #[must_use]
    pub fn new(config: TimeGraphConfig, ctx: TimelineContext) -> Self {
        Self {
            viewport: Viewport::new(&config),
            config,
            ctx,
            report_sink: None,
            sorted_tracks: Vec::new(),
            thread_filter: String::new(),
            last_reorder: None,
            selected_timers: Vec::new(),
            selected_callstack_events: BTreeMap::new(),
            batch: PrimitiveBatch::new(),
        }
    }

    #[must_use]
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn store(&self) -> &TrackStore {
        &self.ctx.tracks
    }

    #[must_use]
    pub fn context(&self) -> &TimelineContext {
        &self.ctx
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Returns true once after new data arrived
    pub fn poll_needs_update(&self) -> bool {
        self.ctx.tracks.take_needs_update()
    }

    /// Drop the capture and reset the view
    pub fn clear(&mut self) {
        self.ctx.tracks.clear();
        self.viewport.reset();
        self.sorted_tracks.clear();
        self.last_reorder = None;
        self.selected_timers.clear();
        self.selected_callstack_events.clear();
        self.batch.clear();
    }

    /// Pull the capture extent from the store into the viewport
    pub fn update_capture_range(&mut self) {
        if let Some(min) = self.ctx.tracks.capture_min_timestamp() {
            self.viewport.set_capture_range(min, self.ctx.tracks.capture_max_timestamp());
        }
    }

    // =========================================================================
    // Viewport shortcuts
    // =========================================================================

    pub fn zoom(&mut self, direction: ZoomDirection, mouse_ratio: f64) {
        self.update_capture_range();
        self.viewport.zoom(direction, mouse_ratio);
    }

    pub fn zoom_all(&mut self) {
        self.update_capture_range();
        self.viewport.zoom_all();
    }

    pub fn zoom_to_timer(&mut self, timer: &TimerRecord) {
        self.update_capture_range();
        self.viewport.zoom_to_timer(timer);
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    /// Only thread names containing one of the space-separated tokens are shown
    pub fn set_thread_filter(&mut self, filter: impl Into<String>) {
        self.thread_filter = filter.into();
        self.last_reorder = None;
    }

    /// Track keys in display order, as of the last sort
    #[must_use]
    pub fn sorted_tracks(&self) -> &[TrackKey] {
        &self.sorted_tracks
    }

    /// Re-sort unless a capture is streaming and the last sort is too recent
    pub fn sort_tracks_if_needed(&mut self, now: Instant) {
        let due = self
            .last_reorder
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.reorder_interval);
        if !self.ctx.tracks.is_capturing() || due {
            self.sort_tracks();
            self.last_reorder = Some(now);
        }
    }

    /// Rebuild the display order
    pub fn sort_tracks(&mut self) {
        let store = &self.ctx.tracks;
        let thread_counts = store.thread_counts();
        let event_counts = store.event_counts();

        // Sampled threads get a lane even without timers
        for tid in event_counts.keys() {
            store.get_or_create_thread_track(*tid);
        }

        let ranked = sort::sorted_thread_ids(&thread_counts, &event_counts);
        let ranked = sort::filter_threads(ranked, &self.thread_filter, |tid| {
            store.thread_name(tid).unwrap_or_default()
        });

        let mut order = Vec::new();
        if store.scheduler_track().is_some_and(|t| !t.is_empty()) {
            order.push(TrackKey::Scheduler);
        }
        order.extend(store.gpu_tracks().iter().map(|t| t.key()));
        if store.track(TrackKey::Thread(Tid::PROCESS)).is_some_and(|t| !t.is_empty()) {
            order.push(TrackKey::Thread(Tid::PROCESS));
        }
        order.extend(
            ranked
                .into_iter()
                .map(TrackKey::Thread)
                .filter(|key| store.track(*key).is_some_and(|t| !t.is_empty())),
        );

        debug!("Sorted {} tracks", order.len());
        self.sorted_tracks = order;
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn select_timer(&mut self, timer: Option<TimerRecord>) {
        self.selected_timers.clear();
        self.selected_timers.extend(timer);
    }

    /// Add to the multi-selection (the span overlay covers all of it)
    pub fn add_selected_timer(&mut self, timer: TimerRecord) {
        if !self.selected_timers.contains(&timer) {
            self.selected_timers.push(timer);
        }
    }

    #[must_use]
    pub fn selected_timers(&self) -> &[TimerRecord] {
        &self.selected_timers
    }

    /// Select the samples of `tid` (all threads for `Tid::PROCESS`) between
    /// two world x positions
    ///
    /// Replaces the previous sample selection. If any selected sample
    /// resolves to a callstack, an aggregated report is published to the
    /// report sink; the cross-thread summary is only generated for
    /// `Tid::PROCESS`. Returns the selected samples.
    pub fn select_events(&mut self, world_start: f32, world_end: f32, tid: Tid) -> Vec<CallstackEvent> {
        let (world_start, world_end) =
            if world_start > world_end { (world_end, world_start) } else { (world_start, world_end) };
        self.update_capture_range();
        let t0 = self.viewport.tick_from_world(world_start);
        let t1 = self.viewport.tick_from_world(world_end);

        let events = self.ctx.tracks.callstack_events(t0, t1, tid);

        self.selected_callstack_events.clear();
        for event in &events {
            self.selected_callstack_events.entry(event.tid).or_default().push(*event);
            if !event.tid.is_process() {
                self.selected_callstack_events.entry(Tid::PROCESS).or_default().push(*event);
            }
        }
        self.ctx.tracks.set_needs_update();

        self.publish_selection_report(&events, tid);
        events
    }

    /// Selected samples of `tid` (`Tid::PROCESS`: all of them)
    #[must_use]
    pub fn selected_callstack_events(&self, tid: Tid) -> &[CallstackEvent] {
        self.selected_callstack_events.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    fn publish_selection_report(&self, events: &[CallstackEvent], tid: Tid) {
        let mut profiler = SamplingProfiler::new().with_address_infos(self.ctx.address_book.snapshot());
        profiler.set_generate_summary(tid.is_process());

        for event in events {
            match self.ctx.callstacks.get(event.callstack_id) {
                Some(callstack) => profiler.add_callstack(event.tid, callstack),
                None => debug!("Selected sample references unknown callstack {}", event.callstack_id),
            }
        }

        if profiler.num_samples() == 0 {
            return;
        }
        if let Some(sink) = &self.report_sink {
            sink.publish_selection_report(profiler.process_samples());
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Jump from the last selected timer and select the neighbor found
    ///
    /// The target is scrolled into view. Without a selection nothing happens.
    pub fn jump_to_neighbor(&mut self, direction: JumpDirection, scope: JumpScope) -> Option<TimerRecord> {
        let Some(reference) = self.selected_timers.last().copied() else {
            debug!("Jump requested without a selected timer");
            return None;
        };
        let target = navigation::find_neighbor(&self.ctx.tracks, &reference, direction, scope)?;

        self.select_timer(Some(target));
        self.update_capture_range();
        self.viewport.horizontally_move_into_view(&target, JUMP_VIEW_DISTANCE);
        Some(target)
    }

    #[must_use]
    pub fn find_next_function_call(
        &self,
        function_address: u64,
        current_end: u64,
        tid: Option<Tid>,
    ) -> Option<TimerRecord> {
        navigation::find_next_function_call(&self.ctx.tracks, function_address, current_end, tid)
    }

    #[must_use]
    pub fn find_previous_function_call(
        &self,
        function_address: u64,
        current_end: u64,
        tid: Option<Tid>,
    ) -> Option<TimerRecord> {
        navigation::find_previous_function_call(&self.ctx.tracks, function_address, current_end, tid)
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Lay the sorted tracks out top to bottom inside `world` and emit the
    /// primitives of the visible window
    pub fn update_primitives(&mut self, world: Rect, screen_width_px: f32, picking: PickingMode) -> &PrimitiveBatch {
        self.viewport.set_world(world, screen_width_px);
        self.update_capture_range();
        self.sort_tracks_if_needed(Instant::now());

        let store = &self.ctx.tracks;
        let tracks: Vec<_> = self.sorted_tracks.iter().filter_map(|key| store.track(*key)).collect();

        let (min_tick, max_tick) = self.viewport.visible_ticks();
        let samples: BTreeMap<Tid, Vec<CallstackEvent>> = tracks
            .iter()
            .filter_map(|track| track.as_thread())
            .map(|thread| (thread.tid(), store.callstack_events(min_tick, max_tick, thread.tid())))
            .collect();
        let selected_samples: HashSet<(u64, Tid)> = self.selected_callstack_event_keys().collect();
        let process_name = store.process_name();

        let draw_ctx = DrawContext {
            viewport: &self.viewport,
            layout: &self.config.layout,
            picking,
            strings: &self.ctx.strings,
            selected_timers: &self.selected_timers,
            samples: &samples,
            selected_samples: &selected_samples,
            num_cores: store.num_cores(),
            process_name: &process_name,
        };

        let layout = &self.config.layout;
        let batch = &mut self.batch;
        batch.clear();

        let mut y = world.y;
        for track in &tracks {
            y += track.draw(batch, &draw_ctx, y);
            y += if track.kind() == TrackKind::Scheduler {
                layout.scheduler_track_offset
            } else {
                layout.space_between_tracks
            };
        }

        if !picking.is_picking() {
            let ticks_per_us = self.config.ticks_per_microsecond;
            draw_selection_overlay(batch, &self.viewport, &self.selected_timers, world, ticks_per_us);
        }
        &self.batch
    }

    fn selected_callstack_event_keys(&self) -> impl Iterator<Item = (u64, Tid)> + '_ {
        self.selected_callstack_events(Tid::PROCESS).iter().map(|e| (e.time, e.tid))
    }

    /// Primitives of the last `update_primitives` call
    #[must_use]
    pub fn primitives(&self) -> &PrimitiveBatch {
        &self.batch
    }

    #[must_use]
    pub fn pick(&self, id: PickingId) -> Option<PickTarget> {
        self.batch.pick(id).copied()
    }

    /// Tooltip of a sample, resolving frames through the captured address infos
    #[must_use]
    pub fn sample_tooltip(&self, event: &CallstackEvent) -> String {
        EventTrack::tooltip(event, &self.ctx.callstacks, |address| self.ctx.address_book.function_name(address))
    }
}

/// Vertical lines at every selected timer plus a labeled region spanning them
#[allow(clippy::cast_precision_loss)]
fn draw_selection_overlay(
    batch: &mut PrimitiveBatch,
    viewport: &Viewport,
    selected: &[TimerRecord],
    world: Rect,
    ticks_per_us: f64,
) {
    if selected.len() < 2 {
        return;
    }
    let (Some(min_start), Some(max_end)) =
        (selected.iter().map(|t| t.start).min(), selected.iter().map(|t| t.end).max())
    else {
        return;
    };

    for timer in selected {
        let x = viewport.world_from_tick(timer.start);
        batch.add_vertical_line(x, world.y, world.height, primitives::z::OVERLAY, OVERLAY_COLOR, None);
    }

    let x0 = viewport.world_from_tick(min_start);
    let x1 = viewport.world_from_tick(max_end);
    let millis = (max_end - min_start) as f64 / ticks_per_us / 1_000.0;
    let rect = Rect::new(x0, world.y, x1 - x0, world.height);
    batch.add_label(rect, primitives::z::OVERLAY, pretty_time(millis), OVERLAY_COLOR, None);
}
