//! # timegraph - Capture Timeline Engine
//!
//! Ingests the event stream of a native-process capture (instrumented
//! function timers, scheduler slices, GPU jobs, sampled callstacks) into
//! per-thread, per-core and per-GPU-timeline lanes, and answers the queries
//! an interactive timeline needs: visible-range primitives, neighbor and
//! same-function navigation, and range selection with sampling aggregation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐   CaptureEvent    ┌──────────────────────┐
//! │   CaptureTransport   │ ────────────────▶ │  Delivery thread     │
//! │ (synthetic / remote) │   (crossbeam)     │  (capture session)   │
//! └──────────────────────┘                   └──────────┬───────────┘
//!            ▲ start request (tokio worker)             │ ingestion
//!            │                                          ▼
//! ┌──────────┴───────────┐                   ┌──────────────────────┐
//! │    CaptureSession    │                   │   TimelineContext    │
//! │   (state machine)    │                   │ tracks · strings ·   │
//! └──────────────────────┘                   │ callstacks · symbols │
//!                                            └──────────┬───────────┘
//!                                                       │ snapshots
//!                                                       ▼
//!                                            ┌──────────────────────┐
//!                                            │      TimeGraph       │
//!                                            │ viewport · sorting · │
//!                                            │ selection · picking  │
//!                                            └──────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`storage`]: append-only timer blocks and chains, scanned without locks
//! - [`tracks`]: thread, scheduler, GPU and sampled-event lanes
//! - [`time_graph`]: track store, viewport, sorting, navigation, primitives
//! - [`sampling`]: callstack store, sample buffer, sampling aggregation
//! - [`capture`]: session state machine, transports, delivery thread
//! - [`export`]: Chrome Trace Event Format output
//! - [`config`], [`cli`], [`domain`]: configuration, arguments, shared types
//!
//! ## Concurrency
//!
//! One delivery thread writes; any number of readers scan. Sealed timer
//! blocks are immutable and published through atomics, so range queries
//! never lock. Track lookup maps, the core-seen set and the sample buffer
//! sit behind one coarse lock held only for a lookup or insert. The
//! presentation side polls a single "needs update" flag.

pub mod capture;
pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod export;
pub mod sampling;
pub mod storage;
pub mod string_table;
pub mod time_graph;
pub mod tracks;
