//! Trace export
//!
//! Writes captured timers in Chrome Trace Event Format for viewing in
//! Perfetto or chrome://tracing.

pub mod chrome_trace;

pub use chrome_trace::ChromeTraceExporter;
