//! Single delivery thread routing capture events into the timeline

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::Receiver;
use log::{debug, error, info};

use super::{CaptureData, CaptureEvent, CaptureState, SessionTimes, StateCell};
use crate::context::TimelineContext;
use crate::sampling::{SamplingProfiler, SamplingReport};

/// Drains the event channel of one capture
///
/// Runs on its own thread, the only caller of the ingestion entry points.
/// Returns the capture data when the stream ends.
pub(crate) struct Dispatcher {
    context: TimelineContext,
    state: Arc<StateCell>,
    times: Arc<Mutex<SessionTimes>>,
    data: CaptureData,
    capturing: bool,
    num_events: u64,
}

impl Dispatcher {
    pub(crate) fn new(
        context: TimelineContext,
        state: Arc<StateCell>,
        times: Arc<Mutex<SessionTimes>>,
        data: CaptureData,
    ) -> Self {
        Self { context, state, times, data, capturing: false, num_events: 0 }
    }

    pub(crate) fn run(mut self, events: &Receiver<CaptureEvent>) -> CaptureData {
        let mut terminated = false;
        for event in events {
            self.num_events += 1;
            if self.handle(event) {
                terminated = true;
                break;
            }
        }

        if !terminated {
            error!("Capture stream closed after {} events without completing", self.num_events);
            self.finish(CaptureState::Failed("capture stream closed unexpectedly".to_string()));
        }
        self.data
    }

    /// Returns true once a terminal event was handled
    fn handle(&mut self, event: CaptureEvent) -> bool {
        match event {
            CaptureEvent::CaptureStarted => {
                self.mark(|times, now| times.capture_started = Some(now));
                match self.state.transition(CaptureState::Capturing) {
                    Ok(()) => {
                        self.capturing = true;
                        self.context.tracks.set_capturing(true);
                    }
                    Err(err) => error!("Ignoring capture start: {err}"),
                }
            }
            CaptureEvent::Timer(timer) => {
                debug_assert!(self.capturing, "timer delivered before the capture started");
                if !self.capturing {
                    error!("Dropping timer delivered before the capture started");
                    return false;
                }
                self.data.update_function_stats(&timer);
                self.context.tracks.process_timer(timer);
            }
            CaptureEvent::KeyAndString { key, value } => {
                self.context.strings.add_if_not_present(key, value);
            }
            CaptureEvent::UniqueCallStack(callstack) => {
                self.context.callstacks.add_unique(callstack);
            }
            CaptureEvent::CallstackEvent(event) => {
                self.context.tracks.on_callstack_event(event);
            }
            CaptureEvent::ThreadName(thread) => {
                self.context.tracks.set_thread_name(thread.tid, thread.name.clone());
                self.data.add_thread_name(thread.tid, thread.name);
            }
            CaptureEvent::AddressInfo(info) => self.context.address_book.add(info),
            CaptureEvent::TracepointInfo { key, info } => self.data.add_tracepoint_info(key, info),
            CaptureEvent::TracepointEvent(event) => self.data.add_tracepoint_event(event),
            CaptureEvent::CaptureComplete => {
                let report = self.sampling_report();
                info!(
                    "Capture complete: {} events, {} timers, {} samples",
                    self.num_events,
                    self.context.tracks.num_timers(),
                    report.total_samples
                );
                self.data.sampling_report = Some(report);
                self.finish(CaptureState::Completed);
                return true;
            }
            CaptureEvent::CaptureCancelled => {
                self.finish(CaptureState::Cancelled);
                return true;
            }
            CaptureEvent::CaptureFailed(message) => {
                error!("Capture failed: {message}");
                self.finish(CaptureState::Failed(message));
                return true;
            }
        }
        false
    }

    /// One aggregation pass over every sample of the capture
    fn sampling_report(&self) -> SamplingReport {
        let mut profiler = SamplingProfiler::new().with_address_infos(self.context.address_book.snapshot());
        profiler.set_generate_summary(true);

        for event in &self.context.tracks.all_callstack_events() {
            match self.context.callstacks.get(event.callstack_id) {
                Some(callstack) => profiler.add_callstack(event.tid, callstack),
                None => debug!("Sample at {} references unknown callstack {}", event.time, event.callstack_id),
            }
        }
        profiler.process_samples()
    }

    fn finish(&mut self, next: CaptureState) {
        self.capturing = false;
        self.context.tracks.set_capturing(false);
        self.mark(|times, now| times.capture_finished = Some(now));
        if let Err(err) = self.state.transition(next) {
            error!("Capture end not recorded: {err}");
        }
    }

    fn mark(&self, set: impl FnOnce(&mut SessionTimes, Instant)) {
        let mut times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        set(&mut times, Instant::now());
    }
}
