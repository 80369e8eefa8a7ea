//! Deduplicated strings announced by the capture stream
//!
//! The transport sends every repeated string (GPU timeline names, GPU stage
//! names, ...) once as a key/value pair and then refers to it by key.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct StringTable {
    strings: RwLock<HashMap<u64, String>>,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key` unless the key is already known
    ///
    /// Returns true if the entry was inserted. A known key keeps its first value.
    pub fn add_if_not_present(&self, key: u64, value: impl Into<String>) -> bool {
        let mut strings = self.strings.write().unwrap_or_else(PoisonError::into_inner);
        if strings.contains_key(&key) {
            return false;
        }
        strings.insert(key, value.into());
        true
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<String> {
        self.strings.read().unwrap_or_else(PoisonError::into_inner).get(&key).cloned()
    }

    /// Resolved string, or an empty string for an unknown key
    #[must_use]
    pub fn get_or_empty(&self, key: u64) -> String {
        self.get(key).unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.strings.read().unwrap_or_else(PoisonError::into_inner).contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.strings.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Snapshot of every entry
    #[must_use]
    pub fn key_to_string_map(&self) -> HashMap<u64, String> {
        self.strings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_wins() {
        let table = StringTable::new();
        assert!(table.add_if_not_present(1, "gfx"));
        assert!(!table.add_if_not_present(1, "compute"));

        assert_eq!(table.get(1).as_deref(), Some("gfx"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_key_falls_back_to_empty() {
        let table = StringTable::new();
        assert!(table.get(42).is_none());
        assert_eq!(table.get_or_empty(42), "");
        assert!(!table.contains(42));
    }

    #[test]
    fn test_clear_and_snapshot() {
        let table = StringTable::new();
        table.add_if_not_present(1, "a");
        table.add_if_not_present(2, "b");

        let snapshot = table.key_to_string_map();
        table.clear();

        assert!(table.is_empty());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&2], "b");
    }
}
