//! Capture session: control surface over one transport
//!
//! A session connects to its transport, resolves the target process and the
//! symbols of its main module, then runs captures. Starting a capture spawns
//! the delivery thread and issues the start request from a small worker
//! pool; stopping only signals the transport and never waits on ingestion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use log::{error, info, warn};
use timegraph_common::{FunctionInfo, ModuleInfo, ProcessInfo};
use tokio::runtime::{Builder, Runtime};

use super::dispatcher::Dispatcher;
use super::{CaptureData, CaptureEvent, CaptureState, CaptureTransport, SessionTimes, StartRequest, StateCell};
use crate::config::SessionOptions;
use crate::context::TimelineContext;
use crate::domain::SessionError;

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Process metadata resolved by [`CaptureSession::init`]
#[derive(Debug, Clone)]
struct Target {
    process: ProcessInfo,
    modules: Vec<ModuleInfo>,
    functions: Vec<FunctionInfo>,
}

pub struct CaptureSession {
    transport: Arc<dyn CaptureTransport>,
    options: SessionOptions,
    context: TimelineContext,
    state: Arc<StateCell>,
    times: Arc<Mutex<SessionTimes>>,
    target: Option<Target>,
    runtime: Option<Runtime>,
    delivery: Option<JoinHandle<CaptureData>>,
    stop_requested: AtomicBool,
    capture_data: Option<CaptureData>,
}

impl CaptureSession {
    #[must_use]
    pub fn new(transport: Arc<dyn CaptureTransport>, options: SessionOptions, context: TimelineContext) -> Self {
        Self {
            transport,
            options,
            context,
            state: Arc::new(StateCell::new()),
            times: Arc::new(Mutex::new(SessionTimes::new())),
            target: None,
            runtime: None,
            delivery: None,
            stop_requested: AtomicBool::new(false),
            capture_data: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state.get()
    }

    #[must_use]
    pub fn context(&self) -> &TimelineContext {
        &self.context
    }

    #[must_use]
    pub fn times(&self) -> SessionTimes {
        self.times.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Data of the last finished capture
    #[must_use]
    pub fn capture_data(&self) -> Option<&CaptureData> {
        self.capture_data.as_ref()
    }

    #[must_use]
    pub fn process(&self) -> Option<&ProcessInfo> {
        self.target.as_ref().map(|t| &t.process)
    }

    /// Connect, find the target process and load the symbols of its binary
    ///
    /// Any failure moves the session to `Failed`.
    pub fn init(&mut self) -> Result<(), SessionError> {
        let state = self.state.get();
        if state != CaptureState::Idle {
            return Err(SessionError::InvalidTransition { from: state.name(), to: CaptureState::Initialized.name() });
        }

        match self.resolve_target() {
            Ok(target) => {
                info!(
                    "Target {} (pid {}) with {} functions",
                    target.process.name,
                    target.process.pid,
                    target.functions.len()
                );
                self.context.tracks.set_process_name(target.process.name.clone());
                self.target = Some(target);
                self.state.transition(CaptureState::Initialized)?;
                self.times.lock().unwrap_or_else(PoisonError::into_inner).initialized = Some(Instant::now());
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn resolve_target(&self) -> Result<Target, SessionError> {
        self.transport.connect()?;
        let pid = self.options.pid;
        let process = self
            .transport
            .list_processes()?
            .into_iter()
            .find(|p| p.pid == pid)
            .ok_or(SessionError::ProcessNotFound(pid))?;

        let modules = self.transport.list_modules(pid)?;
        let main_module = modules
            .iter()
            .find(|m| m.file_path == process.full_path)
            .ok_or(SessionError::MainModuleNotFound)?;
        let symbols_path = self.transport.find_debug_info(main_module)?;
        let functions = self.transport.load_symbols(&symbols_path)?;

        Ok(Target { process, modules, functions })
    }

    fn fail(&self, err: SessionError) -> SessionError {
        error!("Capture session failed: {err}");
        if let Err(transition) = self.state.transition(CaptureState::Failed(err.to_string())) {
            warn!("{transition}");
        }
        err
    }

    /// Main-module functions whose pretty name contains one of the patterns
    ///
    /// A pattern matching nothing is logged and skipped.
    #[must_use]
    pub fn selected_functions(&self) -> Vec<FunctionInfo> {
        let Some(target) = &self.target else {
            return Vec::new();
        };

        for pattern in &self.options.function_patterns {
            if !target.functions.iter().any(|f| f.pretty_name.contains(pattern.as_str())) {
                warn!("No function matches '{pattern}'");
            }
        }

        target
            .functions
            .iter()
            .filter(|f| self.options.function_patterns.iter().any(|p| f.pretty_name.contains(p.as_str())))
            .cloned()
            .collect()
    }

    /// Begin a capture
    ///
    /// Returns once the start request is issued. The session moves to
    /// `Capturing` when the endpoint acknowledges it.
    pub fn start_capture(&mut self) -> Result<(), SessionError> {
        match self.state.get() {
            CaptureState::Initialized if self.delivery.is_none() => {}
            CaptureState::Initialized | CaptureState::Capturing => return Err(SessionError::AlreadyCapturing),
            _ => return Err(SessionError::NotInitialized),
        }
        let Some(target) = self.target.clone() else {
            return Err(SessionError::NotInitialized);
        };
        self.times.lock().unwrap_or_else(PoisonError::into_inner).start_requested = Some(Instant::now());

        let selected = self.selected_functions();
        let request = StartRequest {
            pid: target.process.pid,
            selected_functions: selected.clone(),
            selected_tracepoints: Vec::new(),
        };

        self.context.clear();
        self.context.tracks.set_process_name(target.process.name.clone());
        self.capture_data = None;
        self.stop_requested.store(false, Ordering::SeqCst);

        let runtime = Builder::new_multi_thread()
            .worker_threads(self.options.worker_threads.max(1))
            .max_blocking_threads(self.options.worker_threads.max(1))
            .thread_name("timegraph-worker")
            .build()
            .map_err(|e| SessionError::StartRejected(format!("worker pool: {e}")))?;

        let (events_tx, events_rx) = bounded(self.options.channel_capacity.max(1));
        let dispatcher = Dispatcher::new(
            self.context.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.times),
            CaptureData::new(target.process, target.modules, selected),
        );
        let delivery = thread::Builder::new()
            .name("timegraph-delivery".to_string())
            .spawn(move || dispatcher.run(&events_rx))
            .map_err(|e| SessionError::StartRejected(format!("delivery thread: {e}")))?;

        let transport = Arc::clone(&self.transport);
        runtime.spawn_blocking(move || {
            if let Err(err) = transport.start_capture(request, events_tx.clone()) {
                error!("Start request failed: {err}");
                // The receiver is gone only if delivery already ended
                let _ = events_tx.send(CaptureEvent::CaptureFailed(err.to_string()));
            }
        });

        self.times.lock().unwrap_or_else(PoisonError::into_inner).capture_requested = Some(Instant::now());
        self.runtime = Some(runtime);
        self.delivery = Some(delivery);
        Ok(())
    }

    /// Ask the endpoint to stop
    ///
    /// Returns true for the call that issued the stop. Later calls, or calls
    /// without a running capture, do nothing and return false.
    pub fn stop_capture(&self) -> bool {
        if !self.capture_pending() || self.stop_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Stopping capture");
        self.transport.stop_capture();
        true
    }

    /// Abandon the running capture; it ends as `Cancelled`
    pub fn cancel(&self) -> bool {
        if !self.capture_pending() || self.stop_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Cancelling capture");
        self.transport.cancel();
        true
    }

    fn capture_pending(&self) -> bool {
        self.delivery.is_some() && !self.state.get().is_finished()
    }

    /// Block until the capture ends or `timeout` elapses
    pub fn wait_for_completion(&self, timeout: Duration) -> CaptureState {
        self.state.wait_until(timeout, CaptureState::is_finished)
    }

    /// Block until the endpoint acknowledged the start (or the session ended)
    pub fn wait_until_capturing(&self, timeout: Duration) -> CaptureState {
        self.state.wait_until(timeout, |s| *s == CaptureState::Capturing || s.is_finished())
    }

    /// Join the delivery thread and release the worker pool
    ///
    /// Blocks until the stream ends, so call it after a stop or cancel.
    pub fn finish(&mut self) -> CaptureState {
        if let Some(delivery) = self.delivery.take() {
            match delivery.join() {
                Ok(data) => self.capture_data = Some(data),
                Err(_) => {
                    let _ = self.fail(SessionError::TransportUnavailable("delivery thread panicked".to_string()));
                }
            }
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        }
        self.times.lock().unwrap_or_else(PoisonError::into_inner).log_times();
        self.state.get()
    }

    /// Return a completed session to `Idle`, dropping its capture
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.state.transition(CaptureState::Idle)?;
        self.capture_data = None;
        self.target = None;
        self.context.clear();
        *self.times.lock().unwrap_or_else(PoisonError::into_inner) = SessionTimes::new();
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.delivery.is_some() && !self.state.get().is_finished() {
            warn!("Capture session dropped while capturing; cancelling");
            self.transport.cancel();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
