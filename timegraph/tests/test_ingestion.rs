use std::sync::Arc;
use std::thread;

use timegraph::time_graph::TrackStore;
use timegraph::tracks::TrackKey;
use timegraph_common::{CallstackEvent, CallstackId, CoreId, Tid, TimerKind, TimerRecord, GPU_TIMELINE_SLOT};

fn regular(tid: i32, start: u64, end: u64) -> TimerRecord {
    TimerRecord { start, end, tid: Tid(tid), function_address: 0x100, ..TimerRecord::default() }
}

#[test]
fn test_thousand_timers_across_five_threads() {
    let store = TrackStore::new();
    for i in 0..1000_u64 {
        let tid = (i % 5) as i32 + 1;
        store.process_timer(regular(tid, i * 10, i * 10 + 7));
    }

    assert_eq!(store.num_timers(), 1000);
    assert_eq!(store.thread_tracks().len(), 5);
    assert!(store.thread_tracks().iter().all(|t| t.num_timers() == 200));
    assert_eq!(store.capture_min_timestamp(), Some(0));
    assert_eq!(store.capture_max_timestamp(), 999 * 10 + 7);
    assert_eq!(store.function_hits(0x100), 1000);
    assert!(store.take_needs_update());
    assert!(!store.take_needs_update());
}

#[test]
fn test_scheduler_slices_record_cores() {
    let store = TrackStore::new();
    for (i, core) in [0, 2, 5, 2].into_iter().enumerate() {
        let start = i as u64 * 100;
        store.process_timer(TimerRecord {
            start,
            end: start + 50,
            tid: Tid(9),
            processor: CoreId(core),
            kind: TimerKind::CoreActivity,
            ..TimerRecord::default()
        });
    }

    assert_eq!(store.num_cores(), 3);
    assert_eq!(store.cores_seen(), vec![CoreId(0), CoreId(2), CoreId(5)]);
    let scheduler = store.scheduler_track().unwrap();
    assert_eq!(scheduler.num_timers(), 4);
    // Scheduler slices are not thread calls
    assert!(store.thread_counts().is_empty());
    assert!(store.track(TrackKey::Thread(Tid(9))).is_none());
}

#[test]
fn test_gpu_jobs_route_by_timeline() {
    let store = TrackStore::new();
    for (hash, start) in [(11_u64, 0_u64), (22, 10), (11, 20)] {
        let mut user_data = [0; 2];
        user_data[GPU_TIMELINE_SLOT] = hash;
        store.process_timer(TimerRecord {
            start,
            end: start + 5,
            tid: Tid(1),
            kind: TimerKind::GpuActivity,
            user_data,
            ..TimerRecord::default()
        });
    }

    let gpu = store.gpu_tracks();
    assert_eq!(gpu.len(), 2);
    assert_eq!(store.track(TrackKey::Gpu(11)).unwrap().num_timers(), 2);
    assert_eq!(store.track(TrackKey::Gpu(22)).unwrap().num_timers(), 1);
}

#[test]
fn test_get_or_create_is_idempotent() {
    let store = TrackStore::new();
    let first = store.get_or_create_thread_track(Tid(3));
    let second = store.get_or_create_thread_track(Tid(3));
    assert!(Arc::ptr_eq(&first, &second));

    let gpu = store.get_or_create_gpu_track(7);
    assert!(Arc::ptr_eq(&gpu, &store.get_or_create_gpu_track(7)));
    assert_eq!(store.num_tracks(), 2);
}

#[test]
fn test_samples_feed_thread_and_process_lanes() {
    let store = TrackStore::new();
    for time in [5, 15, 25] {
        store.on_callstack_event(CallstackEvent { time, tid: Tid(4), callstack_id: CallstackId(1) });
    }

    assert!(store.has_events());
    assert_eq!(store.callstack_events(0, 100, Tid(4)).len(), 3);
    assert_eq!(store.callstack_events(0, 100, Tid::PROCESS).len(), 3);
    assert_eq!(store.callstack_events(10, 20, Tid(4)).len(), 1);
    assert!(store.track(TrackKey::Thread(Tid::PROCESS)).is_some());
    assert_eq!(store.capture_max_timestamp(), 25);
}

#[test]
fn test_readers_run_while_ingesting() {
    let store = Arc::new(TrackStore::new());
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..20_000_u64 {
                store.process_timer(regular(1, i * 2, i * 2 + 1));
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                if let Some(track) = store.track(TrackKey::Thread(Tid(1))) {
                    let seen = track.core().chain().iter().count() as u64;
                    assert!(seen >= last);
                    last = seen;
                    let window = track.core().timers_in_range(100, 200);
                    assert!(window.iter().all(|t| t.overlaps(100, 200)));
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.num_timers(), 20_000);
}

#[test]
fn test_clear_keeps_process_name() {
    let store = TrackStore::new();
    store.set_process_name("game");
    store.process_timer(regular(1, 0, 10));
    store.clear();

    assert_eq!(store.num_tracks(), 0);
    assert_eq!(store.capture_min_timestamp(), None);
    assert_eq!(store.process_name(), "game");
}
