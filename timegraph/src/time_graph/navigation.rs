//! Neighbor navigation across lanes
//!
//! Same-thread jumps delegate to the lane owning the reference timer.
//! Same-function jumps scan every thread lane (in tid order), keeping the call
//! whose end tick is closest to, and strictly beyond, the reference end. The
//! block pruning window shrinks as better candidates are found. Equal end
//! ticks are resolved by `(start, tid, depth)`, so the result never depends on
//! arrival order.
//!
//! The cross-lane scan costs O(thread timers); a per-function index would
//! make it proportional to the function's calls instead.

use std::sync::Arc;

use timegraph_common::{TimerKind, TimerRecord};

use super::TrackStore;
use crate::domain::{JumpDirection, JumpScope, Tid};
use crate::tracks::{Track, TrackKey};

/// Key of the lane a timer was routed to
#[must_use]
pub fn owning_track_key(timer: &TimerRecord) -> TrackKey {
    match timer.kind {
        TimerKind::CoreActivity => TrackKey::Scheduler,
        TimerKind::GpuActivity => TrackKey::Gpu(timer.gpu_timeline_hash()),
        TimerKind::Regular | TimerKind::Introspection => TrackKey::Thread(timer.tid),
    }
}

/// Neighbor of `reference` in `direction`, within `scope`
///
/// `Top` and `Down` always stay in the owning lane.
#[must_use]
pub fn find_neighbor(
    store: &TrackStore,
    reference: &TimerRecord,
    direction: JumpDirection,
    scope: JumpScope,
) -> Option<TimerRecord> {
    match (direction, scope) {
        (JumpDirection::Previous, JumpScope::SameFunction) => {
            find_previous_function_call(store, reference.function_address, reference.end, None)
        }
        (JumpDirection::Next, JumpScope::SameFunction) => {
            find_next_function_call(store, reference.function_address, reference.end, None)
        }
        (direction, _) => {
            let track = store.track(owning_track_key(reference))?;
            match direction {
                JumpDirection::Previous => track.get_left(reference),
                JumpDirection::Next => track.get_right(reference),
                JumpDirection::Top => track.get_up(reference),
                JumpDirection::Down => track.get_down(reference),
            }
        }
    }
}

/// Call of `function_address` ending soonest after `current_end`
///
/// `tid` restricts the search to one thread lane.
#[must_use]
pub fn find_next_function_call(
    store: &TrackStore,
    function_address: u64,
    current_end: u64,
    tid: Option<Tid>,
) -> Option<TimerRecord> {
    let mut best: Option<TimerRecord> = None;
    for track in thread_lanes(store, tid) {
        for block in track.core().chain().blocks() {
            let best_end = best.map_or(u64::MAX, |b| b.end);
            if !block.intersects(current_end, best_end) {
                continue;
            }
            for timer in block.iter() {
                if timer.function_address != function_address || timer.end <= current_end {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some(b) => timer.end < b.end || (timer.end == b.end && tie_key(timer) < tie_key(&b)),
                };
                if closer {
                    best = Some(*timer);
                }
            }
        }
    }
    best
}

/// Call of `function_address` ending latest before `current_end`
#[must_use]
pub fn find_previous_function_call(
    store: &TrackStore,
    function_address: u64,
    current_end: u64,
    tid: Option<Tid>,
) -> Option<TimerRecord> {
    let mut best: Option<TimerRecord> = None;
    for track in thread_lanes(store, tid) {
        for block in track.core().chain().blocks() {
            let best_end = best.map_or(0, |b| b.end);
            if !block.intersects(best_end, current_end) {
                continue;
            }
            for timer in block.iter() {
                if timer.function_address != function_address || timer.end >= current_end {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some(b) => timer.end > b.end || (timer.end == b.end && tie_key(timer) < tie_key(&b)),
                };
                if closer {
                    best = Some(*timer);
                }
            }
        }
    }
    best
}

fn tie_key(timer: &TimerRecord) -> (u64, Tid, u8) {
    (timer.start, timer.tid, timer.depth)
}

fn thread_lanes(store: &TrackStore, tid: Option<Tid>) -> Vec<Arc<Track>> {
    match tid {
        Some(tid) => store.track(TrackKey::Thread(tid)).into_iter().collect(),
        None => store.thread_tracks(),
    }
}
