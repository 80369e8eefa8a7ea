//! Sampled callstacks: storage and aggregation
//!
//! - **`EventBuffer`** - per-thread, tick-ordered sample events
//! - **`CallstackStore`** - content-addressed callstacks referenced by events
//! - **`AddressBook`** - symbol information of sampled addresses
//! - **`SamplingProfiler`** - aggregates resolved samples into a report
//!
//! ## Data Flow
//!
//! ```text
//! CallstackEvent ──► EventBuffer (tid, tick) ──┐
//!                                              ├──► SamplingProfiler ──► SamplingReport
//! CallStack ───────► CallstackStore (id) ──────┘
//! ```

pub mod address_book;
pub mod callstack_store;
pub mod event_buffer;
pub mod profiler;

pub use address_book::AddressBook;
pub use callstack_store::CallstackStore;
pub use event_buffer::EventBuffer;
pub use profiler::{
    SampledFunction, SamplingProfiler, SamplingReport, ThreadSampleData,
    MAX_CALLSTACKS_PER_FUNCTION,
};
