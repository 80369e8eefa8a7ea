//! Symbol information for sampled addresses

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use timegraph_common::AddressInfo;

/// Address infos announced by the capture stream, keyed by absolute address
#[derive(Debug, Default)]
pub struct AddressBook {
    infos: RwLock<HashMap<u64, AddressInfo>>,
}

impl AddressBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, info: AddressInfo) {
        self.infos.write().unwrap_or_else(PoisonError::into_inner).insert(info.absolute_address, info);
    }

    #[must_use]
    pub fn get(&self, absolute_address: u64) -> Option<AddressInfo> {
        self.infos.read().unwrap_or_else(PoisonError::into_inner).get(&absolute_address).cloned()
    }

    /// Name of the function containing `absolute_address`
    #[must_use]
    pub fn function_name(&self, absolute_address: u64) -> Option<String> {
        self.get(absolute_address).map(|info| info.function_name)
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<u64, AddressInfo> {
        self.infos.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.infos.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_absolute_address() {
        let book = AddressBook::new();
        book.add(AddressInfo {
            absolute_address: 0x1010,
            function_name: "parse".to_string(),
            offset_in_function: 0x10,
            module_name: "app".to_string(),
        });

        assert_eq!(book.function_name(0x1010).as_deref(), Some("parse"));
        assert_eq!(book.get(0x1010).map(|i| i.function_address()), Some(0x1000));
        assert!(book.function_name(0x1000).is_none());

        book.clear();
        assert!(book.is_empty());
    }
}
