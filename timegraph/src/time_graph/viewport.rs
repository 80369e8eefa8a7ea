//! Visible time window and its mapping onto world coordinates
//!
//! Three coordinate spaces:
//!
//! ```text
//! tick ──(− capture_min_tick) ÷ ticks_per_us──► µs since capture start
//! µs   ──(− min_us) ÷ window_us × world.width + world.x──► world x
//! ```
//!
//! The visible window `[min_us, max_us]` is always clamped to
//! `[0, capture_time_span_us]`.

// Tick/µs/world conversions go through f64 and f32 on purpose
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use timegraph_common::TimerRecord;

use super::primitives::Rect;
use crate::config::TimeGraphConfig;
use crate::domain::ZoomDirection;

/// Windows narrower than one nanosecond are rejected by zoom
const MIN_WINDOW_US: f64 = 0.001;

/// Margin factor applied around a range by `zoom_to`
const ZOOM_TO_EXTENT: f64 = 1.1;

#[derive(Debug, Clone)]
pub struct Viewport {
    ticks_per_us: f64,
    zoom_increment: f64,
    history_window_us: f64,

    capture_min_tick: Option<u64>,
    capture_max_tick: u64,

    min_us: f64,
    max_us: f64,

    world: Rect,
    screen_width_px: f32,
}

impl Viewport {
    #[must_use]
    pub fn new(config: &TimeGraphConfig) -> Self {
        Self {
            ticks_per_us: config.ticks_per_microsecond.max(f64::MIN_POSITIVE),
            zoom_increment: config.zoom_increment,
            history_window_us: config.history_window_us,
            capture_min_tick: None,
            capture_max_tick: 0,
            min_us: 0.0,
            max_us: 0.0,
            world: Rect::default(),
            screen_width_px: 0.0,
        }
    }

    // =========================================================================
    // Capture range and geometry
    // =========================================================================

    /// Update the capture extent; the first tick is fixed at its first value
    pub fn set_capture_range(&mut self, min_tick: u64, max_tick: u64) {
        let min_tick = *self.capture_min_tick.get_or_insert(min_tick);
        self.capture_max_tick = self.capture_max_tick.max(max_tick).max(min_tick);
    }

    pub fn reset(&mut self) {
        self.capture_min_tick = None;
        self.capture_max_tick = 0;
        self.min_us = 0.0;
        self.max_us = 0.0;
    }

    #[must_use]
    pub fn capture_min_tick(&self) -> u64 {
        self.capture_min_tick.unwrap_or(0)
    }

    /// World-space rectangle the timeline is laid out in
    pub fn set_world(&mut self, world: Rect, screen_width_px: f32) {
        self.world = world;
        self.screen_width_px = screen_width_px;
    }

    #[must_use]
    pub fn world(&self) -> Rect {
        self.world
    }

    /// World width covered by one screen pixel
    #[must_use]
    pub fn world_units_per_pixel(&self) -> f32 {
        if self.screen_width_px > 0.0 {
            self.world.width / self.screen_width_px
        } else {
            1.0
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    #[must_use]
    pub fn us_from_tick(&self, tick: u64) -> f64 {
        (tick as f64 - self.capture_min_tick() as f64) / self.ticks_per_us
    }

    #[must_use]
    pub fn tick_from_us(&self, us: f64) -> u64 {
        let ticks = (us * self.ticks_per_us).round();
        if ticks <= 0.0 {
            self.capture_min_tick().saturating_sub((-ticks) as u64)
        } else {
            self.capture_min_tick().saturating_add(ticks as u64)
        }
    }

    /// World x of a time point; 0 when the window is empty
    #[must_use]
    pub fn world_from_us(&self, us: f64) -> f32 {
        let window_us = self.current_time_span_us();
        if window_us == 0.0 {
            return 0.0;
        }
        self.world.x + (((us - self.min_us) / window_us) * f64::from(self.world.width)) as f32
    }

    #[must_use]
    pub fn us_from_world(&self, world_x: f32) -> f64 {
        if self.world.width == 0.0 {
            return self.min_us;
        }
        let ratio = f64::from(world_x - self.world.x) / f64::from(self.world.width);
        self.min_us + ratio * self.current_time_span_us()
    }

    #[must_use]
    pub fn world_from_tick(&self, tick: u64) -> f32 {
        self.world_from_us(self.us_from_tick(tick))
    }

    #[must_use]
    pub fn tick_from_world(&self, world_x: f32) -> u64 {
        self.tick_from_us(self.us_from_world(world_x))
    }

    /// Tick range currently visible
    #[must_use]
    pub fn visible_ticks(&self) -> (u64, u64) {
        (self.tick_from_us(self.min_us), self.tick_from_us(self.max_us))
    }

    // =========================================================================
    // Window
    // =========================================================================

    #[must_use]
    pub fn min_us(&self) -> f64 {
        self.min_us
    }

    #[must_use]
    pub fn max_us(&self) -> f64 {
        self.max_us
    }

    #[must_use]
    pub fn capture_time_span_us(&self) -> f64 {
        self.us_from_tick(self.capture_max_tick).max(0.0)
    }

    #[must_use]
    pub fn current_time_span_us(&self) -> f64 {
        self.max_us - self.min_us
    }

    #[must_use]
    pub fn time_at_ratio(&self, ratio: f64) -> f64 {
        self.min_us + ratio * self.current_time_span_us()
    }

    /// Set the visible window, clamped to `[0, capture_time_span_us]`
    pub fn set_min_max(&mut self, min_us: f64, max_us: f64) {
        let span = self.capture_time_span_us();
        self.min_us = min_us.clamp(0.0, span);
        self.max_us = max_us.clamp(self.min_us, span);
    }

    /// One zoom step around the time at `mouse_ratio` of the window
    pub fn zoom(&mut self, direction: ZoomDirection, mouse_ratio: f64) {
        let scale = match direction {
            ZoomDirection::In => 1.0 - self.zoom_increment,
            ZoomDirection::Out => 1.0 + self.zoom_increment,
        };
        self.zoom_time_by_scale(scale, mouse_ratio);
    }

    /// Shrink (`scale < 1`) or grow (`scale > 1`) the window around the
    /// time at `mouse_ratio`
    ///
    /// The left and right remainders around the reference time are each
    /// multiplied by `scale`, so zooming by `1 / scale` undoes the step
    /// unless the window was clamped.
    pub fn zoom_time_by_scale(&mut self, scale: f64, mouse_ratio: f64) {
        if scale <= 0.0 {
            return;
        }
        let ref_us = self.time_at_ratio(mouse_ratio);
        let time_left = (ref_us - self.min_us).max(0.0);
        let time_right = (self.max_us - ref_us).max(0.0);

        let min_us = ref_us - time_left * scale;
        let max_us = ref_us + time_right * scale;
        if max_us - min_us < MIN_WINDOW_US {
            return;
        }
        self.set_min_max(min_us, max_us);
    }

    /// Show the most recent history window of the capture
    pub fn zoom_all(&mut self) {
        let max_us = self.capture_time_span_us();
        self.set_min_max(max_us - self.history_window_us, max_us);
    }

    /// Center `[min_tick, max_tick]` with a 10 % margin
    pub fn zoom_to(&mut self, min_tick: u64, max_tick: u64) {
        let start = self.us_from_tick(min_tick);
        let end = self.us_from_tick(max_tick.max(min_tick));
        let mid = start + (end - start) / 2.0;
        let extent = ZOOM_TO_EXTENT * (end - start) / 2.0;
        self.set_min_max(mid - extent, mid + extent);
    }

    pub fn zoom_to_timer(&mut self, timer: &TimerRecord) {
        self.zoom_to(timer.start, timer.end);
    }

    /// Pan so the time under `initial_x` follows the cursor to `current_x`
    ///
    /// `initial_time_us` is the window minimum when the pan started.
    pub fn pan_time(&mut self, initial_x: f32, current_x: f32, width: f32, initial_time_us: f64) {
        if width <= 0.0 {
            return;
        }
        let window_us = self.current_time_span_us();
        let initial_local_us = f64::from(initial_x) / f64::from(width) * window_us;
        let dt = f64::from(current_x - initial_x) / f64::from(width) * window_us;
        let current_us = initial_time_us + initial_local_us - dt;

        let max_min = (self.capture_time_span_us() - window_us).max(0.0);
        self.min_us = (current_us - initial_local_us).clamp(0.0, max_min);
        self.max_us = self.min_us + window_us;
    }

    /// Place the window at `ratio` of the scrollable range, keeping its width
    pub fn on_drag(&mut self, ratio: f64) {
        let window_us = self.current_time_span_us();
        let scrollable = (self.capture_time_span_us() - window_us).max(0.0);
        self.min_us = ratio.clamp(0.0, 1.0) * scrollable;
        self.max_us = self.min_us + window_us;
    }

    /// Returns true if any part of `[min_tick, max_tick]` is in the window
    #[must_use]
    pub fn is_visible(&self, min_tick: u64, max_tick: u64) -> bool {
        let start = self.us_from_tick(min_tick);
        let end = self.us_from_tick(max_tick);
        start <= self.max_us && end >= self.min_us
    }

    /// Scroll (without zooming) so `timer` becomes visible
    ///
    /// The timer's center lands at `distance` of the window measured from
    /// the side it came from. A timer already visible leaves the window
    /// untouched.
    pub fn horizontally_move_into_view(&mut self, timer: &TimerRecord, distance: f64) {
        if self.is_visible(timer.start, timer.end) {
            return;
        }
        let start = self.us_from_tick(timer.start);
        let end = self.us_from_tick(timer.end);
        let window_us = self.current_time_span_us();
        let mid = start + (end - start) / 2.0;

        // Mirror the final position when moving left
        let distance = if start < self.min_us { 1.0 - distance } else { distance };
        self.set_min_max(mid - window_us * (1.0 - distance), mid + window_us * distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_viewport(span_ticks: u64) -> Viewport {
        let mut viewport = Viewport::new(&TimeGraphConfig::default());
        viewport.set_capture_range(1_000, 1_000 + span_ticks);
        viewport.set_world(Rect::new(0.0, 0.0, 1_000.0, 500.0), 1_000.0);
        viewport
    }

    #[test]
    fn test_tick_us_world_conversions() {
        let mut viewport = test_viewport(1_000_000);
        viewport.set_min_max(0.0, 1_000.0);

        assert!((viewport.us_from_tick(501_000) - 500.0).abs() < 1e-9);
        assert_eq!(viewport.tick_from_us(500.0), 501_000);
        assert!((viewport.world_from_us(250.0) - 250.0).abs() < 1e-3);
        assert!((viewport.us_from_world(750.0) - 750.0).abs() < 1e-6);
        assert_eq!(viewport.visible_ticks(), (1_000, 1_001_000));
    }

    #[test]
    fn test_empty_window_maps_to_zero() {
        let viewport = test_viewport(1_000);
        assert_eq!(viewport.current_time_span_us(), 0.0);
        assert_eq!(viewport.world_from_us(123.0), 0.0);
    }

    #[test]
    fn test_set_min_max_clamps_to_capture() {
        let mut viewport = test_viewport(10_000);
        viewport.set_min_max(-5.0, 50.0);
        assert_eq!(viewport.min_us(), 0.0);
        assert_eq!(viewport.max_us(), 10.0);
    }

    #[test]
    fn test_zoom_step_scales_remainders_by_increment() {
        let mut viewport = test_viewport(10_000_000);
        viewport.set_min_max(1_000.0, 2_000.0);

        viewport.zoom(ZoomDirection::In, 0.5);
        assert!((viewport.current_time_span_us() - 900.0).abs() < 1e-6);
        assert!((viewport.min_us() - 1_050.0).abs() < 1e-6);
        assert!((viewport.max_us() - 1_950.0).abs() < 1e-6);

        viewport.set_min_max(1_000.0, 2_000.0);
        viewport.zoom(ZoomDirection::Out, 0.25);
        assert!((viewport.min_us() - 975.0).abs() < 1e-6);
        assert!((viewport.max_us() - 2_075.0).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_then_inverse_scale_restores_window() {
        let mut viewport = test_viewport(10_000_000);
        viewport.set_min_max(2_000.0, 6_000.0);

        viewport.zoom_time_by_scale(0.9, 0.25);
        assert!(viewport.current_time_span_us() < 4_000.0);
        viewport.zoom_time_by_scale(1.0 / 0.9, 0.25);

        assert!((viewport.min_us() - 2_000.0).abs() < 1e-6);
        assert!((viewport.max_us() - 6_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_rejects_sub_nanosecond_window() {
        let mut viewport = test_viewport(10_000);
        viewport.set_min_max(1.0, 1.0005);
        viewport.zoom(ZoomDirection::In, 0.5);
        assert_eq!(viewport.min_us(), 1.0);
        assert_eq!(viewport.max_us(), 1.0005);
    }

    #[test]
    fn test_zoom_to_adds_margin() {
        let mut viewport = test_viewport(10_000_000);
        viewport.zoom_to(1_000 + 100_000, 1_000 + 200_000);
        assert!((viewport.min_us() - 95.0).abs() < 1e-9);
        assert!((viewport.max_us() - 205.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_all_shows_history_window() {
        let mut viewport = test_viewport(5_000_000_000);
        viewport.zoom_all();
        assert!((viewport.max_us() - 5_000_000.0).abs() < 1e-6);
        assert!((viewport.min_us() - 3_000_000.0).abs() < 1e-6);

        let mut short = test_viewport(1_000_000);
        short.zoom_all();
        assert_eq!(short.min_us(), 0.0);
    }

    #[test]
    fn test_pan_and_drag_keep_window_width() {
        let mut viewport = test_viewport(10_000_000);
        viewport.set_min_max(1_000.0, 2_000.0);

        viewport.pan_time(500.0, 400.0, 1_000.0, 1_000.0);
        assert!((viewport.min_us() - 1_100.0).abs() < 1e-6);
        assert!((viewport.current_time_span_us() - 1_000.0).abs() < 1e-6);

        viewport.pan_time(500.0, 100_000.0, 1_000.0, 1_000.0);
        assert_eq!(viewport.min_us(), 0.0);

        viewport.on_drag(1.0);
        assert!((viewport.max_us() - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_move_into_view() {
        let mut viewport = test_viewport(10_000_000);
        viewport.set_min_max(0.0, 1_000.0);
        let timer = TimerRecord { start: 1_000 + 5_000_000, end: 1_000 + 5_000_000, ..TimerRecord::default() };
        assert!(!viewport.is_visible(timer.start, timer.end));

        viewport.horizontally_move_into_view(&timer, 0.3);
        assert!(viewport.is_visible(timer.start, timer.end));
        assert!((viewport.current_time_span_us() - 1_000.0).abs() < 1e-6);
        assert!((viewport.min_us() - 4_300.0).abs() < 1e-6);
    }
}
