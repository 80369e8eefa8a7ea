//! Append-only timer storage
//!
//! A [`TimerChain`] is a singly linked run of fixed-capacity [`TimerBlock`]s.
//! One writer, holding the chain's [`ChainCursor`], appends; any number of
//! readers scan concurrently without taking a lock:
//!
//! ```text
//!  head                                         tail (writer cursor)
//!   │                                             │
//!   ▼                                             ▼
//! ┌──────────────┐  next  ┌──────────────┐  next ┌──────────────┐
//! │ sealed block │──────▶│ sealed block │──────▶│  open block  │
//! │ [min,max]    │        │ [min,max]    │       │ len grows    │
//! └──────────────┘        └──────────────┘       └──────────────┘
//! ```
//!
//! - Sealed blocks never change again, so scanning them needs no coordination.
//! - The open block publishes entries through an atomic length; a reader sees
//!   a prefix of it, never a torn entry.
//! - Each block caches the `[min start, max end]` of its entries so range
//!   queries reject whole blocks in O(1).

pub mod timer_block;
pub mod timer_chain;

pub use timer_block::{TimerBlock, TIMER_BLOCK_CAPACITY};
pub use timer_chain::{ChainCursor, TimerChain};
