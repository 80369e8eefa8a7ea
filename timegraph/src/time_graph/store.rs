//! Track arena shared by the delivery and presentation threads
//!
//! ## Locking
//!
//! One coarse scope lock guards the lookup maps, the core-seen set, the event
//! buffer, the small bookkeeping maps and each lane's writer state (chain
//! cursor and per-function hits). It is held only for a lookup, an insert, an
//! O(1) append or a clear, never across a query or a render pass. Readers
//! scan chains without locking at all.
//!
//! The capture extent and the "needs update" hand-off flag are atomics so the
//! presentation thread can poll them without touching the lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use timegraph_common::{CallstackEvent, CoreId, TimerKind, TimerRecord};

use crate::domain::Tid;
use crate::sampling::EventBuffer;
use crate::storage::ChainCursor;
use crate::tracks::{GpuTrack, SchedulerTrack, ThreadTrack, Track, TrackKey};

#[derive(Debug, Default)]
struct TrackMaps {
    thread_tracks: BTreeMap<Tid, Arc<Track>>,
    gpu_tracks: BTreeMap<u64, Arc<Track>>,
    scheduler_track: Option<Arc<Track>>,
    cores_seen: BTreeSet<CoreId>,
    events: EventBuffer,
    /// Thread-lane timers per thread, used to rank lanes
    thread_count_map: BTreeMap<Tid, u64>,
    /// Hits per function address, all lanes
    function_hits: HashMap<u64, u64>,
    thread_names: HashMap<Tid, String>,
    process_name: String,
    writers: HashMap<TrackKey, LaneWriter>,
}

/// Writer-side state of one lane
#[derive(Debug)]
struct LaneWriter {
    cursor: ChainCursor,
    /// Hits per function address on this lane
    function_hits: HashMap<u64, u64>,
}

impl TrackMaps {
    fn thread_track(&mut self, tid: Tid) -> Arc<Track> {
        let name = self.thread_names.get(&tid).cloned().unwrap_or_default();
        Arc::clone(self.thread_tracks.entry(tid).or_insert_with(|| {
            debug!("Created thread track for {tid}");
            Arc::new(Track::Thread(ThreadTrack::new(tid, name)))
        }))
    }

    fn gpu_track(&mut self, timeline_hash: u64) -> Arc<Track> {
        Arc::clone(self.gpu_tracks.entry(timeline_hash).or_insert_with(|| {
            debug!("Created GPU track for timeline {timeline_hash:#x}");
            Arc::new(Track::Gpu(GpuTrack::new(timeline_hash)))
        }))
    }

    fn scheduler_track(&mut self) -> Arc<Track> {
        Arc::clone(self.scheduler_track.get_or_insert_with(|| {
            debug!("Created scheduler track");
            Arc::new(Track::Scheduler(SchedulerTrack::new()))
        }))
    }

    fn append(&mut self, track: &Track, record: TimerRecord) {
        let writer = self.writers.entry(track.key()).or_insert_with(|| LaneWriter {
            cursor: track.core().chain().cursor(),
            function_hits: HashMap::new(),
        });
        if record.function_address != 0 {
            *writer.function_hits.entry(record.function_address).or_insert(0) += 1;
        }
        track.on_timer(&mut writer.cursor, record);
    }
}

/// Every track of the current capture plus the shared ingestion state
#[derive(Debug)]
pub struct TrackStore {
    maps: Mutex<TrackMaps>,
    capture_min_timestamp: AtomicU64,
    capture_max_timestamp: AtomicU64,
    needs_update: AtomicBool,
    is_capturing: AtomicBool,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(TrackMaps::default()),
            capture_min_timestamp: AtomicU64::new(u64::MAX),
            capture_max_timestamp: AtomicU64::new(0),
            needs_update: AtomicBool::new(false),
            is_capturing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackMaps> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Ingestion (delivery thread)
    // =========================================================================

    /// Route a timer to its lane
    ///
    /// - `CoreActivity` goes to the scheduler lane and marks its core as seen
    /// - `GpuActivity` goes to the lane of its GPU timeline hash
    /// - everything else goes to the lane of its thread
    pub fn process_timer(&self, record: TimerRecord) {
        self.update_capture_extent(record.start, record.end);

        {
            let mut maps = self.lock();
            if record.function_address != 0 {
                *maps.function_hits.entry(record.function_address).or_insert(0) += 1;
            }
            let track = match record.kind {
                TimerKind::CoreActivity => {
                    maps.cores_seen.insert(record.processor);
                    maps.scheduler_track()
                }
                TimerKind::GpuActivity => maps.gpu_track(record.gpu_timeline_hash()),
                TimerKind::Regular | TimerKind::Introspection => {
                    *maps.thread_count_map.entry(record.tid).or_insert(0) += 1;
                    maps.thread_track(record.tid)
                }
            };
            maps.append(&track, record);
        }

        self.needs_update.store(true, Ordering::Release);
    }

    /// Record a sample for its thread and for the process lane
    pub fn on_callstack_event(&self, event: CallstackEvent) {
        self.update_capture_extent(event.time, event.time);

        let tracks = {
            let mut maps = self.lock();
            maps.events.add_callstack_event(event);
            let mut tracks = vec![maps.thread_track(Tid::PROCESS)];
            if !event.tid.is_process() {
                tracks.push(maps.thread_track(event.tid));
            }
            tracks
        };

        for track in tracks.iter().filter_map(|t| t.as_thread()) {
            track.event_track().record_event();
        }
        self.needs_update.store(true, Ordering::Release);
    }

    pub fn set_thread_name(&self, tid: Tid, name: impl Into<String>) {
        let name = name.into();
        let mut maps = self.lock();
        if let Some(track) = maps.thread_tracks.get(&tid).and_then(|t| t.as_thread()) {
            track.set_name(name.clone());
        }
        maps.thread_names.insert(tid, name);
    }

    pub fn set_process_name(&self, name: impl Into<String>) {
        self.lock().process_name = name.into();
    }

    /// Drop every track, the core-seen set and the event buffer
    ///
    /// Snapshots held by a reader stay valid until released.
    pub fn clear(&self) {
        {
            let mut maps = self.lock();
            let process_name = std::mem::take(&mut maps.process_name);
            *maps = TrackMaps { process_name, ..TrackMaps::default() };
        }
        self.capture_min_timestamp.store(u64::MAX, Ordering::Release);
        self.capture_max_timestamp.store(0, Ordering::Release);
        self.needs_update.store(true, Ordering::Release);
    }

    fn update_capture_extent(&self, start: u64, end: u64) {
        self.capture_min_timestamp.fetch_min(start, Ordering::AcqRel);
        self.capture_max_timestamp.fetch_max(end, Ordering::AcqRel);
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Lane of `tid`, created on first reference
    pub fn get_or_create_thread_track(&self, tid: Tid) -> Arc<Track> {
        self.lock().thread_track(tid)
    }

    /// Lane of a GPU timeline, created on first reference
    pub fn get_or_create_gpu_track(&self, timeline_hash: u64) -> Arc<Track> {
        self.lock().gpu_track(timeline_hash)
    }

    #[must_use]
    pub fn track(&self, key: TrackKey) -> Option<Arc<Track>> {
        let maps = self.lock();
        match key {
            TrackKey::Scheduler => maps.scheduler_track.clone(),
            TrackKey::Gpu(hash) => maps.gpu_tracks.get(&hash).cloned(),
            TrackKey::Thread(tid) => maps.thread_tracks.get(&tid).cloned(),
        }
    }

    #[must_use]
    pub fn scheduler_track(&self) -> Option<Arc<Track>> {
        self.lock().scheduler_track.clone()
    }

    /// Thread lanes by ascending tid, process lane included
    #[must_use]
    pub fn thread_tracks(&self) -> Vec<Arc<Track>> {
        self.lock().thread_tracks.values().cloned().collect()
    }

    /// GPU lanes by ascending timeline hash
    #[must_use]
    pub fn gpu_tracks(&self) -> Vec<Arc<Track>> {
        self.lock().gpu_tracks.values().cloned().collect()
    }

    #[must_use]
    pub fn num_tracks(&self) -> usize {
        let maps = self.lock();
        maps.thread_tracks.len() + maps.gpu_tracks.len() + usize::from(maps.scheduler_track.is_some())
    }

    /// Timers stored across every lane
    #[must_use]
    pub fn num_timers(&self) -> u64 {
        let maps = self.lock();
        let scheduler = maps.scheduler_track.iter();
        scheduler.chain(maps.gpu_tracks.values()).chain(maps.thread_tracks.values()).map(|t| t.num_timers()).sum()
    }

    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.lock().cores_seen.len()
    }

    #[must_use]
    pub fn cores_seen(&self) -> Vec<CoreId> {
        self.lock().cores_seen.iter().copied().collect()
    }

    #[must_use]
    pub fn function_hits(&self, function_address: u64) -> u64 {
        self.lock().function_hits.get(&function_address).copied().unwrap_or(0)
    }

    /// Hits of one function on one lane
    #[must_use]
    pub fn track_function_hits(&self, key: TrackKey, function_address: u64) -> u64 {
        let maps = self.lock();
        maps.writers.get(&key).and_then(|w| w.function_hits.get(&function_address)).copied().unwrap_or(0)
    }

    /// Instrumented calls (timers with a function address) on one lane
    #[must_use]
    pub fn track_function_calls(&self, key: TrackKey) -> u64 {
        self.lock().writers.get(&key).map_or(0, |w| w.function_hits.values().sum())
    }

    /// `(function address, hits)` by descending hits
    #[must_use]
    pub fn top_functions(&self, limit: usize) -> Vec<(u64, u64)> {
        let mut hits: Vec<(u64, u64)> = self.lock().function_hits.iter().map(|(a, c)| (*a, *c)).collect();
        hits.sort_by_key(|(address, count)| (std::cmp::Reverse(*count), *address));
        hits.truncate(limit);
        hits
    }

    #[must_use]
    pub fn thread_counts(&self) -> BTreeMap<Tid, u64> {
        self.lock().thread_count_map.clone()
    }

    /// Samples per thread, process lane included
    #[must_use]
    pub fn event_counts(&self) -> BTreeMap<Tid, usize> {
        self.lock().events.event_counts()
    }

    /// Samples of `tid` (all threads for `Tid::PROCESS`) with `t0 <= time <= t1`
    #[must_use]
    pub fn callstack_events(&self, t0: u64, t1: u64, tid: Tid) -> Vec<CallstackEvent> {
        self.lock().events.callstack_events(t0, t1, tid)
    }

    /// Every sample of the capture, in tick order
    #[must_use]
    pub fn all_callstack_events(&self) -> Vec<CallstackEvent> {
        self.lock().events.events_for_thread(Tid::PROCESS)
    }

    #[must_use]
    pub fn has_events(&self) -> bool {
        self.lock().events.has_event()
    }

    #[must_use]
    pub fn thread_name(&self, tid: Tid) -> Option<String> {
        self.lock().thread_names.get(&tid).cloned()
    }

    #[must_use]
    pub fn process_name(&self) -> String {
        self.lock().process_name.clone()
    }

    /// First tick of the capture, if anything was ingested
    #[must_use]
    pub fn capture_min_timestamp(&self) -> Option<u64> {
        let min = self.capture_min_timestamp.load(Ordering::Acquire);
        (min != u64::MAX).then_some(min)
    }

    /// Latest tick seen; never decreases until `clear`
    #[must_use]
    pub fn capture_max_timestamp(&self) -> u64 {
        self.capture_max_timestamp.load(Ordering::Acquire)
    }

    // =========================================================================
    // Hand-off flags
    // =========================================================================

    /// Returns and resets the "new data arrived" flag
    pub fn take_needs_update(&self) -> bool {
        self.needs_update.swap(false, Ordering::AcqRel)
    }

    pub fn set_needs_update(&self) {
        self.needs_update.store(true, Ordering::Release);
    }

    pub fn set_capturing(&self, is_capturing: bool) {
        self.is_capturing.store(is_capturing, Ordering::Release);
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::Acquire)
    }
}
