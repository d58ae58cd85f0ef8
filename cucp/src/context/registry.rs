//! Concurrent peer registries
//!
//! DU, AMF and UE entities are looked up by identifier from several tasks at once
//! (the F1 router of each DU, the N2 router, shutdown). Registries are `DashMap`s
//! mutated only when an entity is registered or torn down; everything else about
//! an entity lives behind its own state machine lock.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier is already taken by a live entity
    #[error("{kind} {id} is already registered")]
    Duplicate { kind: &'static str, id: String },

    /// Every identifier of the allocator has been handed out
    #[error("{kind} identifier space exhausted")]
    Exhausted { kind: &'static str },
}

/// Identifier → entity table.
pub struct Registry<K, V> {
    kind: &'static str,
    entries: DashMap<K, Arc<V>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Copy + fmt::Display,
{
    /// Creates an empty registry; `kind` names the entities in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Registers `value` under `id`, refusing to replace a live entry.
    pub fn insert_new(&self, id: K, value: Arc<V>) -> Result<(), RegistryError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate {
                kind: self.kind,
                id: id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &K) -> Option<Arc<V>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&self, id: &K) -> Option<Arc<V>> {
        self.entries.remove(id).map(|(_, value)| value)
    }

    /// Snapshot of every registered entity.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Monotonic identifier source.
///
/// Identifiers are handed out in increasing order and never reused. After
/// `u32::MAX` has been handed out the allocator reports exhaustion instead of
/// wrapping.
#[derive(Debug)]
pub struct IdAllocator {
    kind: &'static str,
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new(kind: &'static str, first: u32) -> Self {
        Self {
            kind,
            next: AtomicU64::new(u64::from(first)),
        }
    }

    pub fn allocate(&self) -> Result<u32, RegistryError> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| {
                (id <= u64::from(u32::MAX)).then_some(id + 1)
            })
            .map_err(|_| RegistryError::Exhausted { kind: self.kind })
            .and_then(|id| {
                u32::try_from(id).map_err(|_| RegistryError::Exhausted { kind: self.kind })
            })
    }
}
