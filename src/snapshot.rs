//! Versioned views of the host's live values.
//!
//! A handle's identity never changes, but the value behind it may be
//! rematerialized when the host reloads. Every snapshot carries the generation
//! it was taken at; a handle refuses to move backwards to an older one.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::EntryId;

/// Type-erased value as stored by the host.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Something a [`Handle`](crate::Handle) can re-resolve itself against.
pub trait RegistrySource {
    /// Generation this source reflects.
    fn generation(&self) -> u64;

    /// The value registered under `id`, if any.
    fn lookup(&self, id: &EntryId) -> Option<ErasedValue>;
}

/// An owned copy of the host's live values at one generation.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    values: HashMap<EntryId, ErasedValue>,
}

impl RegistrySnapshot {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            values: HashMap::new(),
        }
    }

    pub(crate) fn from_values(generation: u64, values: HashMap<EntryId, ErasedValue>) -> Self {
        Self { generation, values }
    }

    pub(crate) fn into_values(self) -> HashMap<EntryId, ErasedValue> {
        self.values
    }

    /// Place `value` under `id`, replacing whatever was there.
    pub fn insert<T: Send + Sync + 'static>(&mut self, id: EntryId, value: Arc<T>) {
        self.values.insert(id, value);
    }

    pub fn remove(&mut self, id: &EntryId) -> bool {
        self.values.remove(id).is_some()
    }

    /// Typed lookup; `None` when absent or stored as another type.
    pub fn get<T: Send + Sync + 'static>(&self, id: &EntryId) -> Option<Arc<T>> {
        self.values
            .get(id)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl RegistrySource for RegistrySnapshot {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn lookup(&self, id: &EntryId) -> Option<ErasedValue> {
        self.values.get(id).cloned()
    }
}

impl std::fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("generation", &self.generation)
            .field("entries", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;

    struct Item;

    #[test]
    fn test_typed_get() {
        let id = EntryId::new("demo", "widget", Category::of::<Item>());
        let mut snapshot = RegistrySnapshot::new(3);
        snapshot.insert(id.clone(), Arc::new(42u32));

        assert_eq!(snapshot.generation(), 3);
        assert_eq!(snapshot.get::<u32>(&id).as_deref(), Some(&42));
        assert!(snapshot.get::<String>(&id).is_none());
        assert!(snapshot.lookup(&id).is_some());
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let id = EntryId::new("demo", "widget", Category::of::<Item>());
        let mut snapshot = RegistrySnapshot::default();
        snapshot.insert(id.clone(), Arc::new(1i32));
        snapshot.insert(id.clone(), Arc::new(2i32));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get::<i32>(&id).as_deref(), Some(&2));

        assert!(snapshot.remove(&id));
        assert!(!snapshot.remove(&id));
        assert!(snapshot.is_empty());
    }
}
