//! Token-keyed attached data
//!
//! Every graph node carries one of these bags. Hydration providers declare a
//! [`Key`] per attribute family at startup and use it to read and write
//! values; the key's identity (not its name) addresses the entry, and its
//! type parameter fixes the stored value type.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The raw identity of a [`Key`], used in provider dependency declarations
pub type KeyId = u64;

/// An opaque token addressing one attribute family
///
/// Two keys created with the same name are still distinct keys.
pub struct Key<T> {
    id: KeyId,
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> Copy for Key<T> {}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Key<T> {
    /// Allocate a fresh key. Call once per attribute family and share the
    /// result; a second call makes an unrelated key.
    pub fn new(name: &'static str) -> Key<T> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Key {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name,
            _value: PhantomData,
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({}#{})", self.name, self.id)
    }
}

/// A concurrent bag of values keyed by [`Key`] identity
#[derive(Default)]
pub struct AttachedData {
    entries: RwLock<HashMap<KeyId, Arc<dyn Any + Send + Sync>>>,
}

impl AttachedData {
    pub fn new() -> AttachedData {
        AttachedData::default()
    }

    pub fn get<T: Any + Send + Sync>(&self, key: Key<T>) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.get(&key.id)?;
        Arc::clone(entry).downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self, key: Key<T>) -> bool {
        self.entries.read().contains_key(&key.id)
    }

    pub fn put<T: Any + Send + Sync>(&self, key: Key<T>, value: T) {
        self.entries.write().insert(key.id, Arc::new(value));
    }

    /// Drop the entry for `key`, if any
    pub fn remove<T: Any + Send + Sync>(&self, key: Key<T>) {
        self.entries.write().remove(&key.id);
    }

    /// Install `init()` under `key` unless a value is already present,
    /// returning whichever value ends up stored
    pub fn compute_if_absent<T: Any + Send + Sync>(
        &self,
        key: Key<T>,
        init: impl FnOnce() -> T,
    ) -> Arc<T> {
        let mut entries = self.entries.write();
        let entry = entries
            .entry(key.id)
            .or_insert_with(|| Arc::new(init()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<T>()
            .ok()
            .expect("attached value type does not match its key")
    }

    /// Atomic read-modify-write for one key: `update` sees the current value
    /// (if any) and produces the replacement. The bag's write lock is held
    /// across the call, so concurrent updates to the same node serialize.
    pub fn update<T: Any + Send + Sync>(
        &self,
        key: Key<T>,
        update: impl FnOnce(Option<&T>) -> T,
    ) {
        let mut entries = self.entries.write();
        let current = entries
            .get(&key.id)
            .and_then(|entry| entry.downcast_ref::<T>());
        let next = update(current);
        entries.insert(key.id, Arc::new(next));
    }
}
