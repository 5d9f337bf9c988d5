use crate::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared record of every datum published during a run, keyed by the
/// resource path it was published at.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct PacketStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl PacketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        tracing::trace!(%key, "store put");
        self.lock().insert(key, value);
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Remove and return the value stored at `key`
    pub fn take(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_removes_entries() {
        let store = PacketStore::new();
        store.put("/a/1", Value::Integer(1));
        let shared = store.clone();
        assert_eq!(shared.peek("/a/1"), Some(Value::Integer(1)));
        assert_eq!(store.take("/a/1"), Some(Value::Integer(1)));
        assert!(shared.is_empty());
        assert_eq!(store.take("/a/1"), None);
    }
}
