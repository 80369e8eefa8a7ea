//! Shared state of one capture
//!
//! Built when a session starts and handed to both the ingestion side (the
//! session's dispatcher) and the presentation side (`TimeGraph`). Nothing
//! here is global; dropping the last clone frees the capture.

use std::sync::Arc;

use crate::sampling::{AddressBook, CallstackStore};
use crate::string_table::StringTable;
use crate::time_graph::TrackStore;

#[derive(Debug, Clone, Default)]
pub struct TimelineContext {
    pub tracks: Arc<TrackStore>,
    pub strings: Arc<StringTable>,
    pub callstacks: Arc<CallstackStore>,
    pub address_book: Arc<AddressBook>,
}

impl TimelineContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every store for a new capture
    pub fn clear(&self) {
        self.tracks.clear();
        self.strings.clear();
        self.callstacks.clear();
        self.address_book.clear();
    }
}
