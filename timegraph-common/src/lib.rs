//! # Shared Capture Records (Transport ↔ Timeline Engine)
//!
//! Defines the already-decoded records a capture transport hands to the
//! timeline engine. Nothing in here knows about tracks, blocks or viewports:
//! these are plain values, `Copy` where the payload allows it, so a transport
//! can build them without pulling in the engine.
//!
//! ## Record Kinds
//!
//! 1. **Timers** - [`TimerRecord`] spans (instrumented calls, scheduler
//!    slices, GPU jobs, introspection scopes)
//! 2. **Samples** - [`CallstackEvent`] points referencing a [`CallStack`]
//! 3. **Metadata** - thread names, address infos, tracepoint infos/events,
//!    process/module/function descriptors
//!
//! Enable the `serde` feature to derive `Serialize`/`Deserialize` on every
//! record.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Number of user-data slots carried by every timer
pub const TIMER_USER_DATA_SLOTS: usize = 2;

/// **GPU timers**: user-data slot holding the string key of the GPU stage
/// ("sw queue", "hw queue", "hw execution")
pub const GPU_STAGE_SLOT: usize = 0;

/// **GPU timers**: user-data slot holding the 64-bit GPU timeline hash
///
/// The hash is also a key into the string table resolving the timeline label.
pub const GPU_TIMELINE_SLOT: usize = 1;

// ============================================================================
// Identifiers
// ============================================================================

/// Thread ID
///
/// `Tid(0)` is reserved for the process-aggregate lane and is never a real
/// thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tid(pub i32);

impl Tid {
    /// The process-aggregate lane (all threads of the target)
    pub const PROCESS: Tid = Tid(0);

    /// Bucket for tracepoint events emitted by other processes
    pub const NOT_TARGET_PROCESS: Tid = Tid(-1);

    /// Returns true for the reserved process-aggregate id
    #[must_use]
    pub fn is_process(self) -> bool {
        self == Self::PROCESS
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// CPU core ID (0, 1, 2, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoreId(pub i32);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU:{}", self.0)
    }
}

/// Callstack ID
///
/// Derived from the frame content, so identical address sequences always
/// share one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CallstackId(pub u64);

impl fmt::Display for CallstackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CS:{:016x}", self.0)
    }
}

// ============================================================================
// Timers
// ============================================================================

/// What produced a timer, which decides the lane it is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimerKind {
    /// Instrumented function call on a thread
    #[default]
    Regular,
    /// A thread running on a core (scheduler slice)
    CoreActivity,
    /// GPU job stage; see [`GPU_STAGE_SLOT`] and [`GPU_TIMELINE_SLOT`]
    GpuActivity,
    /// Profiler self-instrumentation scope
    Introspection,
}

/// One timed span
///
/// Immutable once created. Ticks come from the target's monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerRecord {
    /// Start tick
    pub start: u64,

    /// End tick (`end >= start`)
    pub end: u64,

    /// Thread that ran the span (for GPU jobs: the submitting thread)
    pub tid: Tid,

    /// Core the span ran on (meaningful for `CoreActivity`)
    pub processor: CoreId,

    /// Absolute address of the instrumented function, `0` when none
    pub function_address: u64,

    /// Nesting level inside its lane (0 = outermost)
    pub depth: u8,

    pub kind: TimerKind,

    /// Small fixed payload; GPU timers use it for stage key and timeline hash
    pub user_data: [u64; TIMER_USER_DATA_SLOTS],
}

impl TimerRecord {
    /// Duration in ticks
    #[must_use]
    pub fn elapsed_ticks(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_gpu(&self) -> bool {
        self.kind == TimerKind::GpuActivity
    }

    /// GPU timeline hash (only meaningful for `GpuActivity` timers)
    #[must_use]
    pub fn gpu_timeline_hash(&self) -> u64 {
        self.user_data[GPU_TIMELINE_SLOT]
    }

    /// String key of the GPU stage (only meaningful for `GpuActivity` timers)
    #[must_use]
    pub fn gpu_stage_key(&self) -> u64 {
        self.user_data[GPU_STAGE_SLOT]
    }

    /// Returns true if `[start, end]` overlaps `[min_tick, max_tick]`
    #[must_use]
    pub fn overlaps(&self, min_tick: u64, max_tick: u64) -> bool {
        self.start <= max_tick && self.end >= min_tick
    }
}

// ============================================================================
// Samples
// ============================================================================

/// A sampled callstack taken on a thread at a given tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CallstackEvent {
    pub time: u64,
    pub tid: Tid,
    pub callstack_id: CallstackId,
}

/// An ordered sequence of instruction addresses (innermost frame first)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CallStack {
    pub id: CallstackId,
    pub frames: Vec<u64>,
    pub tid: Tid,
}

impl CallStack {
    /// Build a callstack whose id is derived from its frames
    #[must_use]
    pub fn new(frames: Vec<u64>, tid: Tid) -> Self {
        let id = Self::content_id(&frames);
        Self { id, frames, tid }
    }

    /// Content hash of an address sequence
    #[must_use]
    pub fn content_id(frames: &[u64]) -> CallstackId {
        let mut hasher = DefaultHasher::new();
        frames.hash(&mut hasher);
        CallstackId(hasher.finish())
    }

    /// Innermost (sampled) address
    #[must_use]
    pub fn top_frame(&self) -> Option<u64> {
        self.frames.first().copied()
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Symbol information for one sampled absolute address
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddressInfo {
    pub absolute_address: u64,
    pub function_name: String,
    pub offset_in_function: u64,
    pub module_name: String,
}

impl AddressInfo {
    /// Absolute address of the function containing this address
    #[must_use]
    pub fn function_address(&self) -> u64 {
        self.absolute_address.saturating_sub(self.offset_in_function)
    }
}

/// Kernel or user-space tracepoint descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TracepointInfo {
    pub category: String,
    pub name: String,
}

/// One tracepoint hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TracepointEvent {
    pub time: u64,
    pub tracepoint_info_key: u64,
    pub pid: i32,
    pub tid: Tid,
    pub cpu: CoreId,
}

/// Name announced for a thread of the target
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadName {
    pub tid: Tid,
    pub name: String,
}

/// A function known to the target's main module
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionInfo {
    pub name: String,
    pub pretty_name: String,
    /// Module-relative address
    pub address: u64,
    /// Load bias of the owning module
    pub load_bias: u64,
    pub size: u64,
    pub module_path: String,
}

impl FunctionInfo {
    /// Absolute address in the target process
    #[must_use]
    pub fn absolute_address(&self) -> u64 {
        self.address.wrapping_add(self.load_bias)
    }
}

/// A module mapped into the target process
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleInfo {
    pub name: String,
    pub file_path: String,
    pub file_size: u64,
    pub address_start: u64,
    pub address_end: u64,
    pub build_id: String,
}

/// A process visible to the capture endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessInfo {
    pub pid: i32,
    pub name: String,
    pub full_path: String,
    pub is_64_bit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callstack_id_is_content_addressed() {
        let a = CallStack::new(vec![0x10, 0x20, 0x30], Tid(1));
        let b = CallStack::new(vec![0x10, 0x20, 0x30], Tid(2));
        let c = CallStack::new(vec![0x10, 0x20], Tid(1));

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.top_frame(), Some(0x10));
    }

    #[test]
    fn test_timer_overlap_and_elapsed() {
        let timer = TimerRecord { start: 100, end: 200, ..TimerRecord::default() };
        assert_eq!(timer.elapsed_ticks(), 100);
        assert!(timer.overlaps(150, 300));
        assert!(timer.overlaps(200, 300));
        assert!(!timer.overlaps(201, 300));
        assert!(!timer.overlaps(0, 99));
    }

    #[test]
    fn test_gpu_slots() {
        let timer = TimerRecord {
            kind: TimerKind::GpuActivity,
            user_data: [7, 0xabcd],
            ..TimerRecord::default()
        };
        assert!(timer.is_gpu());
        assert_eq!(timer.gpu_stage_key(), 7);
        assert_eq!(timer.gpu_timeline_hash(), 0xabcd);
    }

    #[test]
    fn test_address_info_function_address() {
        let info = AddressInfo {
            absolute_address: 0x1234,
            function_name: "foo".to_string(),
            offset_in_function: 0x34,
            module_name: "app".to_string(),
        };
        assert_eq!(info.function_address(), 0x1200);
    }

    #[test]
    fn test_tid_display_and_reserved() {
        assert_eq!(Tid(42).to_string(), "TID:42");
        assert!(Tid::PROCESS.is_process());
        assert!(!Tid(3).is_process());
    }
}
