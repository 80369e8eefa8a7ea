//! Metadata and statistics gathered during one capture

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use timegraph_common::{FunctionInfo, ModuleInfo, ProcessInfo, Tid, TimerRecord, TracepointEvent, TracepointInfo};

use crate::sampling::SamplingReport;

/// Per-function timing over the whole capture, in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionStats {
    pub count: u64,
    pub total_ticks: u64,
    pub min_ticks: u64,
    pub max_ticks: u64,
}

impl Default for FunctionStats {
    fn default() -> Self {
        Self { count: 0, total_ticks: 0, min_ticks: u64::MAX, max_ticks: 0 }
    }
}

impl FunctionStats {
    pub fn update(&mut self, elapsed_ticks: u64) {
        self.count += 1;
        self.total_ticks = self.total_ticks.saturating_add(elapsed_ticks);
        self.min_ticks = self.min_ticks.min(elapsed_ticks);
        self.max_ticks = self.max_ticks.max(elapsed_ticks);
    }

    #[must_use]
    pub fn average_ticks(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ticks / self.count
        }
    }
}

/// Everything a finished capture knows besides the timer lanes
///
/// Owned by the delivery thread while capturing and handed back when it
/// joins.
#[derive(Debug, Clone)]
pub struct CaptureData {
    pub process: ProcessInfo,
    /// Modules by file path
    pub module_map: HashMap<String, ModuleInfo>,
    /// Instrumented functions by absolute address
    pub selected_functions: BTreeMap<u64, FunctionInfo>,
    pub function_stats: HashMap<u64, FunctionStats>,
    pub thread_names: BTreeMap<Tid, String>,
    pub tracepoint_infos: HashMap<u64, TracepointInfo>,
    /// Tracepoint hits by thread; other processes share `Tid::NOT_TARGET_PROCESS`
    pub tracepoint_events: BTreeMap<Tid, Vec<TracepointEvent>>,
    pub sampling_report: Option<SamplingReport>,
    warned_addresses: HashSet<u64>,
}

impl CaptureData {
    #[must_use]
    pub fn new(
        process: ProcessInfo,
        modules: Vec<ModuleInfo>,
        selected_functions: impl IntoIterator<Item = FunctionInfo>,
    ) -> Self {
        Self {
            process,
            module_map: modules.into_iter().map(|m| (m.file_path.clone(), m)).collect(),
            selected_functions: selected_functions.into_iter().map(|f| (f.absolute_address(), f)).collect(),
            function_stats: HashMap::new(),
            thread_names: BTreeMap::new(),
            tracepoint_infos: HashMap::new(),
            tracepoint_events: BTreeMap::new(),
            sampling_report: None,
            warned_addresses: HashSet::new(),
        }
    }

    #[must_use]
    pub fn process_id(&self) -> i32 {
        self.process.pid
    }

    #[must_use]
    pub fn selected_function(&self, absolute_address: u64) -> Option<&FunctionInfo> {
        self.selected_functions.get(&absolute_address)
    }

    /// Fold a timer into the statistics of its function
    ///
    /// Timers without a function address are ignored. An address that is
    /// not a selected function is warned about once and skipped.
    pub fn update_function_stats(&mut self, timer: &TimerRecord) {
        let address = timer.function_address;
        if address == 0 {
            return;
        }
        if !self.selected_functions.contains_key(&address) {
            if self.warned_addresses.insert(address) {
                warn!("Timer references unknown function address {address:#x}");
            }
            return;
        }
        self.function_stats.entry(address).or_default().update(timer.elapsed_ticks());
    }

    #[must_use]
    pub fn function_stats(&self, absolute_address: u64) -> Option<&FunctionStats> {
        self.function_stats.get(&absolute_address)
    }

    pub fn add_thread_name(&mut self, tid: Tid, name: String) {
        self.thread_names.insert(tid, name);
    }

    pub fn add_tracepoint_info(&mut self, key: u64, info: TracepointInfo) {
        self.tracepoint_infos.entry(key).or_insert(info);
    }

    #[must_use]
    pub fn tracepoint_info(&self, key: u64) -> Option<&TracepointInfo> {
        self.tracepoint_infos.get(&key)
    }

    pub fn add_tracepoint_event(&mut self, event: TracepointEvent) {
        let tid = if event.pid == self.process.pid { event.tid } else { Tid::NOT_TARGET_PROCESS };
        self.tracepoint_events.entry(tid).or_default().push(event);
    }

    #[must_use]
    pub fn tracepoint_events(&self, tid: Tid) -> &[TracepointEvent] {
        self.tracepoint_events.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn num_tracepoint_events(&self) -> usize {
        self.tracepoint_events.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::CoreId;

    fn process() -> ProcessInfo {
        ProcessInfo { pid: 42, name: "game".to_string(), full_path: "/bin/game".to_string(), is_64_bit: true }
    }

    fn function(name: &str, address: u64) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            pretty_name: name.to_string(),
            address,
            load_bias: 0x1000,
            size: 16,
            module_path: "/bin/game".to_string(),
        }
    }

    #[test]
    fn test_function_stats_track_count_and_extremes() {
        let mut data = CaptureData::new(process(), Vec::new(), vec![function("tick", 0x10)]);
        for (start, end) in [(0, 10), (20, 50), (60, 65)] {
            let timer = TimerRecord { start, end, function_address: 0x1010, ..TimerRecord::default() };
            data.update_function_stats(&timer);
        }

        let stats = data.function_stats(0x1010).copied().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total_ticks, 45);
        assert_eq!(stats.min_ticks, 5);
        assert_eq!(stats.max_ticks, 30);
        assert_eq!(stats.average_ticks(), 15);
    }

    #[test]
    fn test_unknown_function_address_is_skipped() {
        let mut data = CaptureData::new(process(), Vec::new(), vec![function("tick", 0x10)]);
        let timer = TimerRecord { start: 0, end: 5, function_address: 0xdead, ..TimerRecord::default() };
        data.update_function_stats(&timer);
        data.update_function_stats(&timer);

        assert!(data.function_stats.is_empty());
    }

    #[test]
    fn test_foreign_tracepoints_are_bucketed() {
        let mut data = CaptureData::new(process(), Vec::new(), Vec::new());
        let own = TracepointEvent { time: 1, tracepoint_info_key: 7, pid: 42, tid: Tid(43), cpu: CoreId(0) };
        let foreign = TracepointEvent { pid: 99, tid: Tid(100), ..own };
        data.add_tracepoint_event(own);
        data.add_tracepoint_event(foreign);

        assert_eq!(data.tracepoint_events(Tid(43)).len(), 1);
        assert_eq!(data.tracepoint_events(Tid::NOT_TARGET_PROCESS).len(), 1);
        assert!(data.tracepoint_events(Tid(100)).is_empty());
        assert_eq!(data.num_tracepoint_events(), 2);
    }
}
