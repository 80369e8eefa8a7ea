//! Deterministic in-process capture endpoint
//!
//! Generates a plausible capture of a multi-threaded program: nested
//! instrumented calls on every thread, scheduler slices, GPU queue stages,
//! sampled callstacks with their symbols, and a few tracepoint hits. Used by
//! the headless binary and by tests; the same configuration always yields
//! the same event stream.

// Loop indices are small and feed tick arithmetic
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::collections::HashSet;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};
use timegraph_common::{
    AddressInfo, CallStack, CallstackEvent, CallstackId, CoreId, FunctionInfo, ModuleInfo, ProcessInfo, ThreadName, Tid,
    TimerKind, TimerRecord, TracepointEvent, TracepointInfo, GPU_STAGE_SLOT, GPU_TIMELINE_SLOT,
};

use super::{CaptureEvent, CaptureTransport, StartRequest};
use crate::domain::SessionError;
use crate::tracks::gpu_track::{HW_EXECUTION_STAGE, HW_QUEUE_STAGE, SW_QUEUE_STAGE};

const BINARY_PATH: &str = "/opt/synthetic/bin/game";
const MAIN_MODULE_NAME: &str = "game";
const LOAD_BIAS: u64 = 0x5555_0000_0000;
const FIRST_FUNCTION_OFFSET: u64 = 0x1000;
const FUNCTION_SIZE: u64 = 0x100;

const CAPTURE_START_TICK: u64 = 1_000_000;
const TIMER_PERIOD_TICKS: u64 = 100_000;
const THREAD_SKEW_TICKS: u64 = 1_000;
const SAMPLE_PERIOD_TICKS: u64 = 50_000;
const GPU_STAGE_TICKS: u64 = 10_000;

const GPU_STAGES: [(u64, &str); 3] = [(1, SW_QUEUE_STAGE), (2, HW_QUEUE_STAGE), (3, HW_EXECUTION_STAGE)];
const SCHED_SWITCH_KEY: u64 = 1;
/// Offset added to the target pid for tracepoint hits of another process
const FOREIGN_PID_OFFSET: i32 = 1000;

const FUNCTION_NAMES: [&str; 8] = [
    "GameLoop::Tick",
    "Renderer::Draw",
    "Physics::Step",
    "Audio::Mix",
    "Net::Poll",
    "Ai::Think",
    "Io::Flush",
    "Script::Run",
];

/// Failure a [`SyntheticTransport`] injects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFault {
    /// `connect` fails
    Unavailable,
    /// The process binary is not among its modules
    MissingMainModule,
    MissingSymbols,
    /// `start_capture` is refused
    RejectStart,
    /// The stream ends without a terminal event
    DropStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub pid: i32,
    pub process_name: String,
    pub threads: usize,
    pub timers_per_thread: usize,
    pub samples_per_thread: usize,
    pub functions: usize,
    pub gpu_timelines: usize,
    pub cores: usize,
    pub fault: Option<SyntheticFault>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            pid: 4242,
            process_name: "game".to_string(),
            threads: 4,
            timers_per_thread: 250,
            samples_per_thread: 200,
            functions: FUNCTION_NAMES.len(),
            gpu_timelines: 1,
            cores: 4,
            fault: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StopSignal {
    Stop,
    Cancel,
}

#[derive(Debug)]
pub struct SyntheticTransport {
    config: SyntheticConfig,
    stop_tx: Sender<StopSignal>,
    stop_rx: Receiver<StopSignal>,
}

impl SyntheticTransport {
    #[must_use]
    pub fn new(config: SyntheticConfig) -> Self {
        // One pending signal at most; later ones are no-ops
        let (stop_tx, stop_rx) = bounded(1);
        Self { config, stop_tx, stop_rx }
    }

    #[must_use]
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn fault(&self, fault: SyntheticFault) -> bool {
        self.config.fault == Some(fault)
    }

    fn main_module(&self) -> ModuleInfo {
        let end = FIRST_FUNCTION_OFFSET + FUNCTION_SIZE * self.config.functions as u64;
        ModuleInfo {
            name: MAIN_MODULE_NAME.to_string(),
            file_path: BINARY_PATH.to_string(),
            file_size: end,
            address_start: LOAD_BIAS,
            address_end: LOAD_BIAS + end,
            build_id: "5e47e7a1c0ffee".to_string(),
        }
    }

    fn functions(&self) -> Vec<FunctionInfo> {
        (0..self.config.functions)
            .map(|i| {
                let base = FUNCTION_NAMES[i % FUNCTION_NAMES.len()];
                let name = match i / FUNCTION_NAMES.len() {
                    0 => base.to_string(),
                    round => format!("{base}{round}"),
                };
                FunctionInfo {
                    pretty_name: name.clone(),
                    name,
                    address: FIRST_FUNCTION_OFFSET + FUNCTION_SIZE * i as u64,
                    load_bias: LOAD_BIAS,
                    size: FUNCTION_SIZE,
                    module_path: BINARY_PATH.to_string(),
                }
            })
            .collect()
    }

    fn tid(&self, thread_index: usize) -> Tid {
        Tid(self.config.pid + 1 + thread_index as i32)
    }

    fn stream(&self, request: &StartRequest, events: &Sender<CaptureEvent>) -> Result<(), SessionError> {
        let instrumented: Vec<u64> = request.selected_functions.iter().map(FunctionInfo::absolute_address).collect();
        let functions = self.functions();

        for (key, stage) in GPU_STAGES {
            emit(events, CaptureEvent::KeyAndString { key, value: stage.to_string() })?;
        }
        for timeline in 0..self.config.gpu_timelines {
            emit(events, CaptureEvent::KeyAndString { key: timeline_hash(timeline), value: format!("gfx{timeline}") })?;
        }
        let sched_switch = TracepointInfo { category: "sched".to_string(), name: "sched_switch".to_string() };
        emit(events, CaptureEvent::TracepointInfo { key: SCHED_SWITCH_KEY, info: sched_switch })?;

        for thread in 0..self.config.threads {
            let tid = self.tid(thread);
            emit(events, CaptureEvent::ThreadName(ThreadName { tid, name: format!("worker-{thread}") }))?;
            self.stream_timers(thread, &instrumented, events)?;
        }

        let mut seen_callstacks = HashSet::new();
        let mut seen_addresses = HashSet::new();
        for thread in 0..self.config.threads {
            self.stream_samples(thread, &functions, &mut seen_callstacks, &mut seen_addresses, events)?;
        }
        Ok(())
    }

    fn stream_timers(&self, thread: usize, instrumented: &[u64], events: &Sender<CaptureEvent>) -> Result<(), SessionError> {
        let tid = self.tid(thread);
        let skew = THREAD_SKEW_TICKS * thread as u64;

        for i in 0..self.config.timers_per_thread {
            let start = CAPTURE_START_TICK + TIMER_PERIOD_TICKS * i as u64 + skew;
            let end = start + TIMER_PERIOD_TICKS / 2 + (i as u64 % 5) * (TIMER_PERIOD_TICKS / 20);
            let base = TimerRecord { start, end, tid, ..TimerRecord::default() };

            if !instrumented.is_empty() {
                let outer = instrumented[(i + thread) % instrumented.len()];
                let inner = instrumented[(i + thread + 1) % instrumented.len()];
                emit(events, CaptureEvent::Timer(TimerRecord { function_address: outer, ..base }))?;
                let nested = TimerRecord {
                    start: start + TIMER_PERIOD_TICKS / 20,
                    end: end - TIMER_PERIOD_TICKS / 20,
                    function_address: inner,
                    depth: 1,
                    ..base
                };
                emit(events, CaptureEvent::Timer(nested))?;
            }

            if self.config.cores > 0 {
                let processor = CoreId(((thread + i) % self.config.cores) as i32);
                let slice = TimerRecord { kind: TimerKind::CoreActivity, processor, ..base };
                emit(events, CaptureEvent::Timer(slice))?;
            }

            if self.config.gpu_timelines > 0 && i % 4 == 0 {
                let hash = timeline_hash(thread % self.config.gpu_timelines);
                let mut stage_start = end;
                for (depth, (key, _)) in GPU_STAGES.iter().enumerate() {
                    let mut user_data = [0; 2];
                    user_data[GPU_STAGE_SLOT] = *key;
                    user_data[GPU_TIMELINE_SLOT] = hash;
                    let job = TimerRecord {
                        start: stage_start,
                        end: stage_start + GPU_STAGE_TICKS,
                        depth: depth as u8,
                        kind: TimerKind::GpuActivity,
                        user_data,
                        ..base
                    };
                    emit(events, CaptureEvent::Timer(job))?;
                    stage_start += GPU_STAGE_TICKS;
                }
            }

            if i % 10 == 0 {
                let pid = if i % 20 == 0 { self.config.pid } else { self.config.pid + FOREIGN_PID_OFFSET };
                let hit = TracepointEvent {
                    time: start,
                    tracepoint_info_key: SCHED_SWITCH_KEY,
                    pid,
                    tid,
                    cpu: CoreId((thread % self.config.cores.max(1)) as i32),
                };
                emit(events, CaptureEvent::TracepointEvent(hit))?;
            }
        }
        Ok(())
    }

    fn stream_samples(
        &self,
        thread: usize,
        functions: &[FunctionInfo],
        seen_callstacks: &mut HashSet<CallstackId>,
        seen_addresses: &mut HashSet<u64>,
        events: &Sender<CaptureEvent>,
    ) -> Result<(), SessionError> {
        if functions.is_empty() {
            return Ok(());
        }
        let tid = self.tid(thread);
        let skew = THREAD_SKEW_TICKS * thread as u64;

        for s in 0..self.config.samples_per_thread {
            let leaf = &functions[(s + thread) % functions.len()];
            let caller = &functions[(s / 2 + thread) % functions.len()];
            let root = &functions[0];
            let frames = [(leaf, 0x10), (caller, 0x20), (root, 0x4)];

            for (function, offset) in frames {
                let absolute_address = function.absolute_address() + offset;
                if seen_addresses.insert(absolute_address) {
                    let info = AddressInfo {
                        absolute_address,
                        function_name: function.pretty_name.clone(),
                        offset_in_function: offset,
                        module_name: MAIN_MODULE_NAME.to_string(),
                    };
                    emit(events, CaptureEvent::AddressInfo(info))?;
                }
            }

            let callstack = CallStack::new(frames.iter().map(|(f, offset)| f.absolute_address() + offset).collect(), tid);
            let callstack_id = callstack.id;
            if seen_callstacks.insert(callstack_id) {
                emit(events, CaptureEvent::UniqueCallStack(callstack))?;
            }

            let time = CAPTURE_START_TICK + SAMPLE_PERIOD_TICKS * s as u64 + skew + 1;
            emit(events, CaptureEvent::CallstackEvent(CallstackEvent { time, tid, callstack_id }))?;
        }
        Ok(())
    }
}

impl CaptureTransport for SyntheticTransport {
    fn connect(&self) -> Result<(), SessionError> {
        if self.fault(SyntheticFault::Unavailable) {
            return Err(SessionError::TransportUnavailable("synthetic endpoint is offline".to_string()));
        }
        debug!("Synthetic transport connected");
        Ok(())
    }

    fn list_processes(&self) -> Result<Vec<ProcessInfo>, SessionError> {
        Ok(vec![ProcessInfo {
            pid: self.config.pid,
            name: self.config.process_name.clone(),
            full_path: BINARY_PATH.to_string(),
            is_64_bit: true,
        }])
    }

    fn list_modules(&self, pid: i32) -> Result<Vec<ModuleInfo>, SessionError> {
        if pid != self.config.pid {
            return Err(SessionError::ProcessNotFound(pid));
        }
        let libc = ModuleInfo {
            name: "libc.so.6".to_string(),
            file_path: "/usr/lib/libc.so.6".to_string(),
            file_size: 0x20_0000,
            address_start: 0x7f00_0000_0000,
            address_end: 0x7f00_0020_0000,
            build_id: String::new(),
        };
        if self.fault(SyntheticFault::MissingMainModule) {
            return Ok(vec![libc]);
        }
        Ok(vec![self.main_module(), libc])
    }

    fn find_debug_info(&self, module: &ModuleInfo) -> Result<String, SessionError> {
        if self.fault(SyntheticFault::MissingSymbols) || module.file_path != BINARY_PATH {
            return Err(SessionError::SymbolsNotFound(module.file_path.clone()));
        }
        Ok(format!("{BINARY_PATH}.debug"))
    }

    fn load_symbols(&self, symbols_path: &str) -> Result<Vec<FunctionInfo>, SessionError> {
        if symbols_path != format!("{BINARY_PATH}.debug") {
            return Err(SessionError::SymbolsNotFound(symbols_path.to_string()));
        }
        Ok(self.functions())
    }

    fn start_capture(&self, request: StartRequest, events: Sender<CaptureEvent>) -> Result<(), SessionError> {
        if self.fault(SyntheticFault::RejectStart) {
            return Err(SessionError::StartRejected("synthetic endpoint refused the request".to_string()));
        }
        info!(
            "Synthetic capture of pid {} started ({} functions instrumented)",
            request.pid,
            request.selected_functions.len()
        );

        emit(&events, CaptureEvent::CaptureStarted)?;
        self.stream(&request, &events)?;
        if self.fault(SyntheticFault::DropStream) {
            return Ok(());
        }

        let terminal = match self.stop_rx.recv() {
            Ok(StopSignal::Stop) => CaptureEvent::CaptureComplete,
            Ok(StopSignal::Cancel) | Err(_) => CaptureEvent::CaptureCancelled,
        };
        emit(&events, terminal)
    }

    fn stop_capture(&self) {
        // Full means a signal is already pending
        let _ = self.stop_tx.try_send(StopSignal::Stop);
    }

    fn cancel(&self) {
        let _ = self.stop_tx.try_send(StopSignal::Cancel);
    }
}

fn timeline_hash(timeline: usize) -> u64 {
    0x9e37_79b9_7f4a_7c15_u64.wrapping_mul(timeline as u64 + 1)
}

fn emit(events: &Sender<CaptureEvent>, event: CaptureEvent) -> Result<(), SessionError> {
    events
        .send(event)
        .map_err(|_| SessionError::TransportUnavailable("capture event receiver dropped".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn small_config() -> SyntheticConfig {
        SyntheticConfig { threads: 2, timers_per_thread: 8, samples_per_thread: 6, ..SyntheticConfig::default() }
    }

    fn capture(transport: &SyntheticTransport, request: StartRequest) -> Vec<CaptureEvent> {
        let (tx, rx) = unbounded();
        transport.stop_capture();
        transport.start_capture(request, tx).unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn test_stream_is_framed_by_start_and_complete() {
        let transport = SyntheticTransport::new(small_config());
        let events = capture(&transport, StartRequest { pid: 4242, ..StartRequest::default() });

        assert_eq!(events.first(), Some(&CaptureEvent::CaptureStarted));
        assert_eq!(events.last(), Some(&CaptureEvent::CaptureComplete));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_only_selected_functions_are_timed() {
        let transport = SyntheticTransport::new(small_config());
        let selected: Vec<FunctionInfo> = transport.functions().into_iter().take(2).collect();
        let addresses: HashSet<u64> = selected.iter().map(FunctionInfo::absolute_address).collect();
        let events = capture(&transport, StartRequest { pid: 4242, selected_functions: selected, ..StartRequest::default() });

        let timed: HashSet<u64> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Timer(t) if t.kind == TimerKind::Regular => Some(t.function_address),
                _ => None,
            })
            .collect();
        assert_eq!(timed, addresses);
    }

    #[test]
    fn test_same_config_same_stream() {
        let a = capture(&SyntheticTransport::new(small_config()), StartRequest::default());
        let b = capture(&SyntheticTransport::new(small_config()), StartRequest::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_sample_references_a_known_callstack() {
        let events = capture(&SyntheticTransport::new(small_config()), StartRequest::default());
        let known: HashSet<_> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::UniqueCallStack(cs) => Some(cs.id),
                _ => None,
            })
            .collect();
        let samples: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::CallstackEvent(ev) => Some(ev.callstack_id),
                _ => None,
            })
            .collect();

        assert_eq!(samples.len(), 12);
        assert!(samples.iter().all(|id| known.contains(id)));
    }

    #[test]
    fn test_cancel_ends_with_cancelled() {
        let transport = SyntheticTransport::new(small_config());
        let (tx, rx) = unbounded();
        transport.cancel();
        transport.stop_capture();
        transport.start_capture(StartRequest::default(), tx).unwrap();

        assert_eq!(rx.try_iter().last(), Some(CaptureEvent::CaptureCancelled));
    }

    #[test]
    fn test_faults() {
        let with_fault = |fault| SyntheticTransport::new(SyntheticConfig { fault: Some(fault), ..small_config() });

        assert!(matches!(
            with_fault(SyntheticFault::Unavailable).connect(),
            Err(SessionError::TransportUnavailable(_))
        ));
        let modules = with_fault(SyntheticFault::MissingMainModule).list_modules(4242).unwrap();
        assert!(modules.iter().all(|m| m.file_path != BINARY_PATH));
        assert!(with_fault(SyntheticFault::RejectStart)
            .start_capture(StartRequest::default(), unbounded().0)
            .is_err());
        assert_eq!(
            SyntheticTransport::new(small_config()).list_modules(1),
            Err(SessionError::ProcessNotFound(1))
        );
    }
}
