//! Engine and session configuration
//!
//! Plain structs with `Default`s; the headless binary maps its CLI flags onto
//! them (see `cli::Args`).

use std::time::Duration;

/// Vertical layout constants, in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Height of one timer row
    pub text_box_height: f32,
    /// Gap between consecutive tracks
    pub space_between_tracks: f32,
    /// Height of the sampled-event strip on top of a thread track
    pub event_track_height: f32,
    /// Padding below the last row of a track
    pub track_bottom_margin: f32,
    /// Extra gap below the scheduler track
    pub scheduler_track_offset: f32,
    /// Height of a track's label row
    pub track_label_height: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            text_box_height: 20.0,
            space_between_tracks: 10.0,
            event_track_height: 10.0,
            track_bottom_margin: 5.0,
            scheduler_track_offset: 10.0,
            track_label_height: 20.0,
        }
    }
}

/// Timeline engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGraphConfig {
    /// Ticks per microsecond of the target clock (1000 for nanosecond ticks)
    pub ticks_per_microsecond: f64,
    /// Minimum delay between two track reorders while capturing
    pub reorder_interval: Duration,
    /// Relative window change of one zoom step
    pub zoom_increment: f64,
    /// Width of the window shown by `zoom_all`, in microseconds
    pub history_window_us: f64,
    pub layout: Layout,
}

impl Default for TimeGraphConfig {
    fn default() -> Self {
        Self {
            ticks_per_microsecond: 1_000.0,
            reorder_interval: Duration::from_secs(1),
            zoom_increment: 0.1,
            history_window_us: 2_000_000.0,
            layout: Layout::default(),
        }
    }
}

/// Capture session options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Target process
    pub pid: i32,
    /// Substrings matched against function pretty names to instrument
    pub function_patterns: Vec<String>,
    /// Worker threads of the pool issuing start requests
    pub worker_threads: usize,
    /// Bound of the tagged-event channel between transport and dispatcher
    pub channel_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { pid: 0, function_patterns: Vec::new(), worker_threads: 1, channel_capacity: 4096 }
    }
}
