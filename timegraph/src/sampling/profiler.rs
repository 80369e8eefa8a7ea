//! Aggregation of sampled callstacks into a per-function report
//!
//! # Architecture
//!
//! - **`SamplingProfiler`** - collects `(thread, callstack)` samples, then
//!   aggregates them in one `process_samples()` pass
//! - **`SamplingReport`** - per-thread function rankings (plus an optional
//!   cross-thread summary under [`Tid::PROCESS`])
//!
//! # Counting
//!
//! - **Exclusive**: the function owns the innermost frame of the sample
//! - **Inclusive**: the function appears anywhere in the sample (counted once
//!   per sample, even when recursive)
//!
//! Frame addresses are mapped to the address of their function through the
//! captured [`AddressInfo`]s (`absolute_address - offset_in_function`).
//! Frames without an address info are kept as their own "function".

// Percentage calculations intentionally convert counts to f64
#![allow(clippy::cast_precision_loss)]

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use timegraph_common::{AddressInfo, CallStack, CallstackId, Tid};

/// Maximum unique callstacks kept per function
///
/// Bounds the report when a function is reached from many call sites; the
/// most frequent paths are the ones worth showing.
pub const MAX_CALLSTACKS_PER_FUNCTION: usize = 5;

/// Name shown for frames without symbol information
pub const UNKNOWN_FUNCTION_NAME: &str = "???";

// =============================================================================
// REPORT (OUTPUT TYPES)
// =============================================================================

/// One function's share of the samples of a thread
#[derive(Debug, Clone)]
pub struct SampledFunction {
    /// Function name, [`UNKNOWN_FUNCTION_NAME`] if unresolved
    pub name: String,

    pub module: String,

    /// Function address (the frame address itself if unresolved)
    pub address: u64,

    /// Samples whose innermost frame is in this function
    pub exclusive: u64,

    /// Samples with any frame in this function
    pub inclusive: u64,

    /// `exclusive` as a percentage of the thread's samples (0.0 - 100.0)
    pub exclusive_percent: f64,

    /// `inclusive` as a percentage of the thread's samples (0.0 - 100.0)
    pub inclusive_percent: f64,

    /// Distinct callstacks ending in this function with their sample counts
    ///
    /// Limited to `MAX_CALLSTACKS_PER_FUNCTION`, most frequent first.
    pub callstacks: Vec<(Arc<CallStack>, u64)>,
}

/// Aggregated samples of one thread (or of all threads for the summary)
#[derive(Debug, Clone)]
pub struct ThreadSampleData {
    pub tid: Tid,
    pub num_samples: u64,
    /// Sorted by exclusive count, then inclusive count, descending
    pub functions: Vec<SampledFunction>,
}

impl ThreadSampleData {
    #[must_use]
    pub fn function(&self, address: u64) -> Option<&SampledFunction> {
        self.functions.iter().find(|f| f.address == address)
    }
}

/// Result of one aggregation pass
#[derive(Debug, Clone, Default)]
pub struct SamplingReport {
    /// Summary first (if generated), then threads by ascending id
    pub threads: Vec<ThreadSampleData>,
    pub total_samples: u64,
}

impl SamplingReport {
    #[must_use]
    pub fn thread(&self, tid: Tid) -> Option<&ThreadSampleData> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    /// Cross-thread summary, if the pass generated one
    #[must_use]
    pub fn summary(&self) -> Option<&ThreadSampleData> {
        self.thread(Tid::PROCESS)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }
}

// =============================================================================
// PROFILER (AGGREGATOR)
// =============================================================================

/// Statistics for one function of one thread during aggregation
#[derive(Debug, Default)]
struct FunctionStats {
    exclusive: u64,
    inclusive: u64,
    /// Every distinct callstack ending here; trimmed when the report is built
    callstacks: HashMap<CallstackId, (Arc<CallStack>, u64)>,
}

/// Collects resolved samples and aggregates them per thread
#[derive(Debug, Default)]
pub struct SamplingProfiler {
    generate_summary: bool,
    samples: Vec<(Tid, Arc<CallStack>)>,
    address_infos: HashMap<u64, AddressInfo>,
}

impl SamplingProfiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also aggregate every sample into a summary under [`Tid::PROCESS`]
    pub fn set_generate_summary(&mut self, generate_summary: bool) {
        self.generate_summary = generate_summary;
    }

    /// Symbol information used to map frames to functions
    #[must_use]
    pub fn with_address_infos(mut self, address_infos: HashMap<u64, AddressInfo>) -> Self {
        self.address_infos = address_infos;
        self
    }

    pub fn add_callstack(&mut self, tid: Tid, callstack: Arc<CallStack>) {
        self.samples.push((tid, callstack));
    }

    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Aggregate every collected sample
    #[must_use]
    pub fn process_samples(&self) -> SamplingReport {
        let mut per_thread: BTreeMap<Tid, (u64, HashMap<u64, FunctionStats>)> = BTreeMap::new();

        for (tid, callstack) in &self.samples {
            self.record_sample(per_thread.entry(*tid).or_default(), callstack);
            if self.generate_summary && !tid.is_process() {
                self.record_sample(per_thread.entry(Tid::PROCESS).or_default(), callstack);
            }
        }

        // Any address info of a function carries its name
        let mut symbols: HashMap<u64, &AddressInfo> = HashMap::new();
        for info in self.address_infos.values() {
            symbols.entry(info.function_address()).or_insert(info);
        }

        let threads = per_thread
            .into_iter()
            .map(|(tid, (num_samples, functions))| to_thread_data(tid, num_samples, functions, &symbols))
            .collect();

        SamplingReport { threads, total_samples: self.samples.len() as u64 }
    }

    fn record_sample(
        &self,
        (num_samples, functions): &mut (u64, HashMap<u64, FunctionStats>),
        callstack: &Arc<CallStack>,
    ) {
        *num_samples += 1;

        let mut seen_in_sample = HashSet::new();
        for (depth, &frame) in callstack.frames.iter().enumerate() {
            let address = self.function_address(frame);
            let stats = functions.entry(address).or_default();

            if seen_in_sample.insert(address) {
                stats.inclusive += 1;
            }
            if depth == 0 {
                stats.exclusive += 1;
                stats.callstacks.entry(callstack.id).or_insert_with(|| (Arc::clone(callstack), 0)).1 += 1;
            }
        }
    }

    fn function_address(&self, frame: u64) -> u64 {
        self.address_infos.get(&frame).map_or(frame, AddressInfo::function_address)
    }
}

fn to_thread_data(
    tid: Tid,
    num_samples: u64,
    functions: HashMap<u64, FunctionStats>,
    symbols: &HashMap<u64, &AddressInfo>,
) -> ThreadSampleData {
    let percent =
        |count: u64| if num_samples > 0 { count as f64 / num_samples as f64 * 100.0 } else { 0.0 };

    let mut functions: Vec<SampledFunction> = functions
        .into_iter()
        .map(|(address, stats)| {
            let (name, module) = symbols.get(&address).map_or_else(
                || (UNKNOWN_FUNCTION_NAME.to_string(), String::new()),
                |info| (info.function_name.clone(), info.module_name.clone()),
            );

            let mut callstacks: Vec<(Arc<CallStack>, u64)> = stats.callstacks.into_values().collect();
            callstacks.sort_by_key(|(cs, count)| (Reverse(*count), cs.id));
            callstacks.truncate(MAX_CALLSTACKS_PER_FUNCTION);

            SampledFunction {
                name,
                module,
                address,
                exclusive: stats.exclusive,
                inclusive: stats.inclusive,
                exclusive_percent: percent(stats.exclusive),
                inclusive_percent: percent(stats.inclusive),
                callstacks,
            }
        })
        .collect();

    functions.sort_by_key(|f| (Reverse(f.exclusive), Reverse(f.inclusive), f.address));
    ThreadSampleData { tid, num_samples, functions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(absolute_address: u64, offset: u64, name: &str) -> (u64, AddressInfo) {
        (
            absolute_address,
            AddressInfo {
                absolute_address,
                function_name: name.to_string(),
                offset_in_function: offset,
                module_name: "app".to_string(),
            },
        )
    }

    fn profiler() -> SamplingProfiler {
        // main at 0x100, work at 0x200, leaf at 0x300
        let infos = [
            info(0x104, 0x4, "main"),
            info(0x208, 0x8, "work"),
            info(0x20c, 0xc, "work"),
            info(0x310, 0x10, "leaf"),
        ];
        SamplingProfiler::new().with_address_infos(infos.into_iter().collect())
    }

    #[test]
    fn test_exclusive_and_inclusive_counts() {
        let mut profiler = profiler();
        let deep = Arc::new(CallStack::new(vec![0x310, 0x208, 0x104], Tid(1)));
        let shallow = Arc::new(CallStack::new(vec![0x20c, 0x104], Tid(1)));
        profiler.add_callstack(Tid(1), Arc::clone(&deep));
        profiler.add_callstack(Tid(1), Arc::clone(&deep));
        profiler.add_callstack(Tid(1), shallow);

        let report = profiler.process_samples();
        let thread = report.thread(Tid(1)).unwrap();
        assert_eq!(thread.num_samples, 3);

        let leaf = thread.function(0x300).unwrap();
        assert_eq!(leaf.name, "leaf");
        assert_eq!((leaf.exclusive, leaf.inclusive), (2, 2));

        // Two distinct frame addresses resolve to the same function
        let work = thread.function(0x200).unwrap();
        assert_eq!(work.name, "work");
        assert_eq!((work.exclusive, work.inclusive), (1, 3));

        let main = thread.function(0x100).unwrap();
        assert_eq!((main.exclusive, main.inclusive), (0, 3));
        assert!((main.inclusive_percent - 100.0).abs() < f64::EPSILON);

        assert_eq!(thread.functions[0].name, "leaf");
    }

    #[test]
    fn test_summary_only_when_requested() {
        let mut profiler = profiler();
        profiler.add_callstack(Tid(1), Arc::new(CallStack::new(vec![0x104], Tid(1))));
        profiler.add_callstack(Tid(2), Arc::new(CallStack::new(vec![0x104], Tid(2))));

        assert!(profiler.process_samples().summary().is_none());

        profiler.set_generate_summary(true);
        let report = profiler.process_samples();
        let summary = report.summary().unwrap();
        assert_eq!(summary.num_samples, 2);
        assert_eq!(report.threads[0].tid, Tid::PROCESS);
        assert_eq!(report.total_samples, 2);
    }

    #[test]
    fn test_callstacks_bounded_and_sorted() {
        let mut profiler = SamplingProfiler::new();
        for caller in 0..8u64 {
            let stack = Arc::new(CallStack::new(vec![0x999, 0x1000 + caller], Tid(1)));
            for _ in 0..=caller {
                profiler.add_callstack(Tid(1), Arc::clone(&stack));
            }
        }

        let report = profiler.process_samples();
        let hot = report.thread(Tid(1)).unwrap().function(0x999).unwrap();
        assert_eq!(hot.name, UNKNOWN_FUNCTION_NAME);
        assert_eq!(hot.exclusive, 36);
        assert_eq!(hot.callstacks.len(), MAX_CALLSTACKS_PER_FUNCTION);

        // Five most frequent callers, most frequent first
        let counts: Vec<u64> = hot.callstacks.iter().map(|(_, count)| *count).collect();
        assert_eq!(counts, vec![8, 7, 6, 5, 4]);
    }

    #[test]
    fn test_late_hot_callstack_is_kept() {
        let mut profiler = SamplingProfiler::new();
        for caller in 0..5u64 {
            profiler.add_callstack(Tid(1), Arc::new(CallStack::new(vec![0x999, 0x1000 + caller], Tid(1))));
        }
        let hot_stack = Arc::new(CallStack::new(vec![0x999, 0x2000], Tid(1)));
        for _ in 0..100 {
            profiler.add_callstack(Tid(1), Arc::clone(&hot_stack));
        }

        let report = profiler.process_samples();
        let hot = report.thread(Tid(1)).unwrap().function(0x999).unwrap();
        assert_eq!(hot.exclusive, 105);
        assert_eq!(hot.callstacks.len(), MAX_CALLSTACKS_PER_FUNCTION);
        assert_eq!(hot.callstacks[0].0.id, hot_stack.id);
        assert_eq!(hot.callstacks[0].1, 100);
    }

    #[test]
    fn test_empty_profiler() {
        let report = SamplingProfiler::new().process_samples();
        assert!(report.is_empty());
        assert!(report.threads.is_empty());
    }
}
