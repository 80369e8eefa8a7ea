//! Content-addressed callstack storage

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use timegraph_common::{CallStack, CallstackId};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<CallstackId, Arc<CallStack>>,
    /// Ids assigned by a transport that differ from the content id
    aliases: HashMap<CallstackId, CallstackId>,
}

/// Process-wide callstack set, deduplicated by frame content
///
/// Written by the delivery thread, read by selection and tooltips.
#[derive(Debug, Default)]
pub struct CallstackStore {
    inner: RwLock<Inner>,
}

impl CallstackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `callstack` unless an identical address sequence is known
    ///
    /// Returns the canonical (content) id. An id the transport assigned is
    /// kept as an alias, so events referring to it still resolve.
    pub fn add_unique(&self, callstack: CallStack) -> CallstackId {
        let canonical = CallStack::content_id(&callstack.frames);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if callstack.id != canonical {
            inner.aliases.insert(callstack.id, canonical);
        }
        if !inner.by_id.contains_key(&canonical) {
            debug!("New callstack {} with {} frames", canonical, callstack.frames.len());
            let stored = CallStack { id: canonical, ..callstack };
            inner.by_id.insert(canonical, Arc::new(stored));
        }
        canonical
    }

    /// Callstack for a canonical or aliased id
    #[must_use]
    pub fn get(&self, id: CallstackId) -> Option<Arc<CallStack>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let id = inner.aliases.get(&id).copied().unwrap_or(id);
        inner.by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: CallstackId) -> bool {
        self.get(id).is_some()
    }

    /// Number of distinct callstacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.clear();
        inner.aliases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::Tid;

    #[test]
    fn test_identical_frames_share_one_id() {
        let store = CallstackStore::new();
        let a = store.add_unique(CallStack::new(vec![1, 2, 3], Tid(1)));
        let b = store.add_unique(CallStack::new(vec![1, 2, 3], Tid(2)));

        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_foreign_id_is_aliased() {
        let store = CallstackStore::new();
        let foreign = CallStack { id: CallstackId(99), frames: vec![0x10, 0x20], tid: Tid(4) };
        let canonical = store.add_unique(foreign);

        assert_ne!(canonical, CallstackId(99));
        let by_alias = store.get(CallstackId(99)).unwrap();
        assert_eq!(by_alias.id, canonical);
        assert_eq!(by_alias.frames, vec![0x10, 0x20]);
    }

    #[test]
    fn test_unknown_id_and_clear() {
        let store = CallstackStore::new();
        let id = store.add_unique(CallStack::new(vec![5], Tid(1)));
        assert!(store.contains(id));
        assert!(store.get(CallstackId(1)).is_none());

        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains(id));
    }
}
