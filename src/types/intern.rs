//! Weak-valued interning pools
//!
//! One process-wide pool exists per root AST type, keyed by the canonical
//! internal rendering of the value. While interning is enabled, two parsed
//! values with equal canonical forms are the same `Arc` allocation, so
//! structural equality can be checked with `Arc::ptr_eq`.

use super::JvmText;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

static INTERNING_ENABLED: AtomicBool = AtomicBool::new(true);

/// Globally enable or disable interning
///
/// When disabled, factories and parsers return fresh allocations and the
/// pools are left untouched; the reference-equality guarantee no longer
/// holds. `equals`/`hashCode` semantics are unaffected either way.
pub fn set_interning_enabled(enabled: bool) {
    INTERNING_ENABLED.store(enabled, Ordering::Relaxed);
}

pub(crate) fn interning_enabled() -> bool {
    INTERNING_ENABLED.load(Ordering::Relaxed)
}

/// Every this many pool inserts, dead weak entries are swept out. The sweep
/// runs inline on the inserting thread rather than on a dedicated reaper.
const SWEEP_INTERVAL: usize = 1024;

/// A weak-valued table from canonical form to the unique live instance
pub struct Interner<T> {
    entries: Mutex<HashMap<String, Weak<T>>>,
    inserts: AtomicUsize,
}

impl<T: JvmText> Interner<T> {
    pub fn new() -> Interner<T> {
        Interner {
            entries: Mutex::new(HashMap::new()),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Return the canonical instance for `value`, installing it if no equal
    /// value is currently alive
    pub fn intern(&self, value: T) -> Arc<T> {
        if !interning_enabled() {
            return Arc::new(value);
        }
        let key = value.render();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let arc = Arc::new(value);
        entries.insert(key, Arc::downgrade(&arc));
        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts % SWEEP_INTERVAL == 0 {
            entries.retain(|_, weak| weak.strong_count() > 0);
        }
        arc
    }

    /// Number of entries currently tracked, dead or alive
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: JvmText> Default for Interner<T> {
    fn default() -> Self {
        Interner::new()
    }
}

#[cfg(test)]
mod test {
    use crate::types::{MethodDescriptor, TypeDescriptor};
    use std::sync::Arc;

    #[test]
    fn parsing_twice_yields_one_instance() {
        let a = TypeDescriptor::parse("Ljava/lang/String;").unwrap();
        let b = TypeDescriptor::parse("Ljava/lang/String;").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn factories_and_parsing_share_instances() {
        let parsed = TypeDescriptor::parse("[I").unwrap();
        let built = TypeDescriptor::array(1, crate::types::TypeDescriptor::Base(crate::types::BaseType::Int));
        assert!(Arc::ptr_eq(&parsed, &built));
    }

    #[test]
    fn method_descriptors_are_pooled() {
        let a = MethodDescriptor::parse("(I)V").unwrap();
        let b = MethodDescriptor::parse("(I)V").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = MethodDescriptor::parse("(J)V").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
