use std::sync::Arc;
use std::time::Duration;

use timegraph::capture::{CaptureSession, CaptureState, SyntheticConfig, SyntheticFault, SyntheticTransport};
use timegraph::config::SessionOptions;
use timegraph::context::TimelineContext;
use timegraph::domain::SessionError;
use timegraph_common::Tid;

const TIMEOUT: Duration = Duration::from_secs(10);

fn config(fault: Option<SyntheticFault>) -> SyntheticConfig {
    SyntheticConfig { threads: 2, timers_per_thread: 20, samples_per_thread: 15, fault, ..SyntheticConfig::default() }
}

fn session_with(config: SyntheticConfig, pid: i32, patterns: &[&str]) -> CaptureSession {
    let options = SessionOptions {
        pid,
        function_patterns: patterns.iter().map(ToString::to_string).collect(),
        ..SessionOptions::default()
    };
    CaptureSession::new(Arc::new(SyntheticTransport::new(config)), options, TimelineContext::new())
}

fn session(fault: Option<SyntheticFault>) -> CaptureSession {
    let config = config(fault);
    let pid = config.pid;
    session_with(config, pid, &[""])
}

fn run_to_end(session: &mut CaptureSession) -> CaptureState {
    session.init().unwrap();
    session.start_capture().unwrap();
    if session.wait_until_capturing(TIMEOUT) == CaptureState::Capturing {
        session.stop_capture();
    }
    session.finish()
}

#[test]
fn test_completed_capture_populates_timeline() {
    let mut session = session(None);
    assert_eq!(run_to_end(&mut session), CaptureState::Completed);

    let store = &session.context().tracks;
    // Per thread: 2 nested calls and 1 slice per period, 3 GPU stages every 4th period
    assert_eq!(store.num_timers(), 2 * (20 * 3 + 5 * 3));
    assert_eq!(store.num_cores(), 4);
    assert_eq!(store.gpu_tracks().len(), 1);
    assert_eq!(store.process_name(), "game");
    assert!(!store.is_capturing());

    let data = session.capture_data().unwrap();
    assert_eq!(data.thread_names.len(), 2);
    assert_eq!(store.all_callstack_events().len(), 30);
    assert!(!data.tracepoint_events(Tid::NOT_TARGET_PROCESS).is_empty());
    assert!(!data.function_stats.is_empty());
    assert!(data.function_stats.values().all(|s| s.count > 0 && s.min_ticks <= s.max_ticks));

    let report = data.sampling_report.as_ref().unwrap();
    assert_eq!(report.total_samples, 30);
    assert_eq!(report.summary().unwrap().num_samples, 30);

    let times = session.times();
    assert!(times.capture_started.is_some());
    assert!(times.capture_finished.is_some());
}

#[test]
fn test_cancelled_capture_has_no_report() {
    let mut session = session(None);
    session.init().unwrap();
    session.start_capture().unwrap();
    assert_eq!(session.wait_until_capturing(TIMEOUT), CaptureState::Capturing);

    assert!(session.cancel());
    assert!(!session.stop_capture());
    assert_eq!(session.finish(), CaptureState::Cancelled);
    assert!(session.capture_data().unwrap().sampling_report.is_none());
}

#[test]
fn test_dropped_stream_fails_session() {
    let mut session = session(Some(SyntheticFault::DropStream));
    session.init().unwrap();
    session.start_capture().unwrap();

    let state = session.wait_for_completion(TIMEOUT);
    assert!(matches!(state, CaptureState::Failed(_)));
    assert!(matches!(session.finish(), CaptureState::Failed(_)));
}

#[test]
fn test_rejected_start_fails_with_message() {
    let mut session = session(Some(SyntheticFault::RejectStart));
    session.init().unwrap();
    session.start_capture().unwrap();

    match session.finish() {
        CaptureState::Failed(message) => assert!(message.contains("refused")),
        other => panic!("unexpected state {other}"),
    }
}

#[test]
fn test_init_failures() {
    let mut missing_process = session_with(config(None), 1, &[]);
    assert_eq!(missing_process.init(), Err(SessionError::ProcessNotFound(1)));
    assert!(matches!(missing_process.state(), CaptureState::Failed(_)));

    let mut no_main_module = session(Some(SyntheticFault::MissingMainModule));
    assert_eq!(no_main_module.init(), Err(SessionError::MainModuleNotFound));

    let mut offline = session(Some(SyntheticFault::Unavailable));
    assert!(matches!(offline.init(), Err(SessionError::TransportUnavailable(_))));
    assert_eq!(offline.start_capture(), Err(SessionError::NotInitialized));
}

#[test]
fn test_double_start_is_rejected() {
    let mut session = session(None);
    session.init().unwrap();
    session.start_capture().unwrap();

    assert_eq!(session.start_capture(), Err(SessionError::AlreadyCapturing));

    session.wait_until_capturing(TIMEOUT);
    session.stop_capture();
    assert_eq!(session.finish(), CaptureState::Completed);
}

#[test]
fn test_reset_allows_a_second_capture() {
    let mut session = session(None);
    assert_eq!(run_to_end(&mut session), CaptureState::Completed);
    let first = session.context().tracks.num_timers();

    session.reset().unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.capture_data().is_none());

    assert_eq!(run_to_end(&mut session), CaptureState::Completed);
    assert_eq!(session.context().tracks.num_timers(), first);
}

#[test]
fn test_no_patterns_means_no_instrumented_calls() {
    let config = config(None);
    let pid = config.pid;
    let mut session = session_with(config, pid, &[]);
    assert_eq!(run_to_end(&mut session), CaptureState::Completed);

    assert!(session.context().tracks.thread_counts().is_empty());
    assert!(session.capture_data().unwrap().selected_functions.is_empty());
    // Scheduler slices and samples still arrive
    assert!(session.context().tracks.scheduler_track().is_some());
    assert!(session.context().tracks.has_events());
}
