// Tick deltas fit an f64 mantissa for any realistic capture length
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use timegraph_common::{Tid, TimerKind, TimerRecord};

use crate::capture::CaptureData;
use crate::context::TimelineContext;
use crate::domain::ExportError;

/// Chrome Trace Event format
/// Format reference: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (function name for timers)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete, "M" = metadata
    ph: String,
    /// Timestamp in microseconds since the first exported timer
    ts: f64,
    /// Duration in microseconds ("X" events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    pid: i32,
    tid: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Writes captured timers for Perfetto / chrome://tracing
///
/// Interchange only: the output cannot be loaded back as a capture.
pub struct ChromeTraceExporter {
    pid: i32,
    ticks_per_microsecond: f64,
    /// Tick mapped to `ts = 0`
    start_tick: Option<u64>,
    events: Vec<ChromeTraceEvent>,
    thread_names: HashMap<Tid, String>,
    process_name: Option<String>,
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new(pid: i32, ticks_per_microsecond: f64) -> Self {
        Self {
            pid,
            ticks_per_microsecond,
            start_tick: None,
            events: Vec::new(),
            thread_names: HashMap::new(),
            process_name: None,
        }
    }

    /// Exporter holding every thread timer of a finished capture
    #[must_use]
    pub fn from_capture(context: &TimelineContext, capture: &CaptureData, ticks_per_microsecond: f64) -> Self {
        let mut exporter = Self::new(capture.process_id(), ticks_per_microsecond);
        exporter.start_tick = context.tracks.capture_min_timestamp();
        exporter.process_name = Some(capture.process.name.clone());

        for (tid, name) in &capture.thread_names {
            exporter.set_thread_name(*tid, name.clone());
        }

        for track in context.tracks.thread_tracks() {
            for timer in track.core().chain().iter() {
                let name = match timer.function_address {
                    0 => "timer".to_string(),
                    address => capture
                        .selected_function(address)
                        .map(|f| f.pretty_name.clone())
                        .or_else(|| context.address_book.function_name(address))
                        .unwrap_or_else(|| format!("{address:#x}")),
                };
                exporter.add_timer(timer, name);
            }
        }
        exporter
    }

    pub fn set_thread_name(&mut self, tid: Tid, name: impl Into<String>) {
        self.thread_names.insert(tid, name.into());
    }

    /// Add one timer as a complete ("X") event
    pub fn add_timer(&mut self, timer: &TimerRecord, name: String) {
        let start_tick = *self.start_tick.get_or_insert(timer.start);
        let ts = timer.start.saturating_sub(start_tick) as f64 / self.ticks_per_microsecond;
        let dur = timer.elapsed_ticks() as f64 / self.ticks_per_microsecond;

        let mut args = HashMap::new();
        args.insert("depth".to_string(), serde_json::json!(timer.depth));
        if timer.function_address != 0 {
            args.insert("address".to_string(), serde_json::json!(format!("{:#x}", timer.function_address)));
        }

        let cat = match timer.kind {
            TimerKind::Introspection => "introspection",
            _ => "function",
        };

        self.events.push(ChromeTraceEvent {
            name,
            cat: cat.to_string(),
            ph: "X".to_string(),
            ts,
            dur: Some(dur),
            pid: self.pid,
            tid: timer.tid.0,
            args: Some(args),
        });
    }

    /// Number of timer events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Export the trace to any writer (file, stdout, buffer)
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        if self.events.is_empty() {
            return Err(ExportError::EmptyCapture);
        }

        let mut all_events = self.events.clone();
        if let Some(process_name) = &self.process_name {
            all_events.push(self.metadata("process_name", Tid::PROCESS.0, process_name));
        }

        let mut threads: Vec<_> = self.thread_names.iter().collect();
        threads.sort_by_key(|(tid, _)| **tid);
        for (tid, name) in threads {
            all_events.push(self.metadata("thread_name", tid.0, name));
        }

        let trace = ChromeTrace { trace_events: all_events, display_time_unit: "ms".to_string() };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    pub fn export_to_file(&self, path: &Path) -> Result<(), ExportError> {
        if self.events.is_empty() {
            return Err(ExportError::EmptyCapture);
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.export(&mut writer)?;
        writer.flush()?;
        info!("Exported {} timers to {}", self.events.len(), path.display());
        Ok(())
    }

    fn metadata(&self, kind: &str, tid: i32, name: &str) -> ChromeTraceEvent {
        let mut args = HashMap::new();
        args.insert("name".to_string(), serde_json::json!(name));
        ChromeTraceEvent {
            name: kind.to_string(),
            cat: String::new(),
            ph: "M".to_string(),
            ts: 0.0,
            dur: None,
            pid: self.pid,
            tid,
            args: Some(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(start: u64, end: u64, tid: i32) -> TimerRecord {
        TimerRecord { start, end, tid: Tid(tid), function_address: 0x40, ..TimerRecord::default() }
    }

    #[test]
    fn test_empty_export_is_rejected() {
        let exporter = ChromeTraceExporter::new(1, 1000.0);
        let mut buffer = Vec::new();
        assert!(matches!(exporter.export(&mut buffer), Err(ExportError::EmptyCapture)));
    }

    #[test]
    fn test_complete_events_are_relative_microseconds() {
        let mut exporter = ChromeTraceExporter::new(7, 1000.0);
        exporter.add_timer(&timer(5_000, 7_500, 3), "Tick".to_string());
        exporter.add_timer(&timer(9_000, 10_000, 3), "Draw".to_string());
        exporter.set_thread_name(Tid(3), "main");

        let mut buffer = Vec::new();
        exporter.export(&mut buffer).unwrap();
        let json: JsonValue = serde_json::from_slice(&buffer).unwrap();
        let events = json["traceEvents"].as_array().unwrap();

        assert_eq!(json["displayTimeUnit"], "ms");
        assert_eq!(events[0]["ph"], "X");
        assert_eq!(events[0]["ts"], 0.0);
        assert_eq!(events[0]["dur"], 2.5);
        assert_eq!(events[1]["ts"], 4.0);
        assert_eq!(events[1]["pid"], 7);
        assert_eq!(events[2]["ph"], "M");
        assert_eq!(events[2]["args"]["name"], "main");
        assert!(events[2].get("dur").is_none());
    }
}
