//! `Locator` and `Subcontext` (`spec.md` §3.7, §4.4): the instance store a
//! [`crate::producer`] run fills in and an [`crate::injector::Injector`]
//! hands back to callers.
//!
//! `Locator` is a cheap-clone handle over a shared, lock-guarded store —
//! the same shape as `pavexc`'s `DiagnosticSink` (`compiler/pavexc/src/
//! diagnostic/sink.rs`): an `Arc<Inner>` where `Inner` holds a lock so many
//! clones can append concurrently without any clone owning the data.

use std::sync::{Arc, RwLock};

use ahash::HashMap;

use crate::error::AggregateCleanupError;
use crate::functoid::BoxedValue;
use crate::key::Key;

#[derive(Clone, Debug)]
enum StoredValue {
    Scalar(BoxedValue),
    Set(Arc<Vec<BoxedValue>>),
}

struct Inner {
    parent: Option<Locator>,
    values: RwLock<HashMap<Key, StoredValue>>,
}

/// A hierarchical, cheap-clone store of produced instances (`spec.md` §3.7).
///
/// Lookups that miss locally fall through to `parent`, recursively — the
/// mechanism behind [`Locator::create_subcontext`] and overriding a single
/// Key for one call without rebuilding the whole graph.
#[derive(Clone)]
pub struct Locator {
    inner: Arc<Inner>,
}

/// A Subcontext is, structurally, just a [`Locator`] with a parent
/// (`spec.md` §4.4: "each Subcontext is itself a Locator").
pub type Subcontext = Locator;

impl Locator {
    /// An empty, parentless Locator — the one a top-level [`crate::producer`]
    /// run fills in.
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// A Locator backed by `parent` for anything not found locally
    /// (`spec.md` §4.4: "a Subcontext is a Locator with a parent").
    pub fn create_subcontext(&self) -> Locator {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<Locator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent,
                values: RwLock::new(HashMap::default()),
            }),
        }
    }

    pub(crate) fn insert_scalar(&self, key: Key, value: BoxedValue) {
        self.inner
            .values
            .write()
            .expect("locator lock poisoned")
            .insert(key, StoredValue::Scalar(value));
    }

    pub(crate) fn insert_set(&self, key: Key, values: Vec<BoxedValue>) {
        self.inner
            .values
            .write()
            .expect("locator lock poisoned")
            .insert(key, StoredValue::Set(Arc::new(values)));
    }

    fn lookup(&self, key: &Key) -> Option<StoredValue> {
        if let Some(value) = self.inner.values.read().expect("locator lock poisoned").get(key) {
            return Some(value.clone());
        }
        self.inner.parent.as_ref().and_then(|parent| parent.lookup(key))
    }

    /// `true` if `key` can be resolved locally or through an ancestor
    /// (`spec.md` §4.4).
    pub fn has(&self, key: &Key) -> bool {
        self.lookup(key).is_some()
    }

    /// The raw, type-erased value for a scalar `key`, if present.
    pub fn find(&self, key: &Key) -> Option<BoxedValue> {
        match self.lookup(key)? {
            StoredValue::Scalar(value) => Some(value),
            StoredValue::Set(_) => None,
        }
    }

    /// The typed value for a scalar `key`, downcasting its stored instance.
    pub fn get<T: Send + Sync + 'static>(&self, key: &Key) -> Option<Arc<T>> {
        self.find(key)?.downcast::<T>().ok()
    }

    /// The elements of a collection bound at `key` (`key` must be
    /// `set_of(...)`): the union of this Locator's own set at `key` and
    /// every ancestor's, not a child-shadows-parent lookup — a Subcontext's
    /// set Keys merge rather than override (`spec.md` §4.4).
    pub fn get_set(&self, key: &Key) -> Option<Arc<Vec<BoxedValue>>> {
        let mut merged = Vec::new();
        let mut found = false;
        let mut current = Some(self);
        while let Some(locator) = current {
            if let Some(StoredValue::Set(values)) = locator.inner.values.read().expect("locator lock poisoned").get(key) {
                merged.extend(values.iter().cloned());
                found = true;
            }
            current = locator.inner.parent.as_ref();
        }
        found.then(|| Arc::new(merged))
    }

    /// Keys held locally by this Locator — does not include ancestors'.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.values.read().expect("locator lock poisoned").keys().cloned().collect()
    }

    /// Release any resources held by produced instances.
    ///
    /// `spec.md` §1 scopes resource-lifecycle management (open/close hooks,
    /// drop ordering) out of this crate: instances are plain `Arc<dyn Any>`
    /// values with no destructor contract beyond Rust's own `Drop`, so this
    /// is a deliberate no-op kept for API symmetry with the error taxonomy's
    /// [`AggregateCleanupError`] (`spec.md` §4.4, §7).
    pub fn close(&self) -> Result<(), AggregateCleanupError> {
        Ok(())
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips_through_get() {
        let locator = Locator::new();
        let key = Key::of::<i64>();
        locator.insert_scalar(key.clone(), Arc::new(42i64));
        assert_eq!(*locator.get::<i64>(&key).unwrap(), 42);
    }

    #[test]
    fn subcontext_falls_through_to_parent() {
        let parent = Locator::new();
        let key = Key::of::<i64>();
        parent.insert_scalar(key.clone(), Arc::new(1i64));

        let child = parent.create_subcontext();
        assert_eq!(*child.get::<i64>(&key).unwrap(), 1);
    }

    #[test]
    fn subcontext_override_shadows_the_parent() {
        let parent = Locator::new();
        let key = Key::of::<i64>();
        parent.insert_scalar(key.clone(), Arc::new(1i64));

        let child = parent.create_subcontext();
        child.insert_scalar(key.clone(), Arc::new(2i64));
        assert_eq!(*child.get::<i64>(&key).unwrap(), 2);
        assert_eq!(*parent.get::<i64>(&key).unwrap(), 1);
    }

    #[test]
    fn subcontext_set_elements_union_with_the_parent() {
        let parent = Locator::new();
        let set_key = Key::of::<i64>().set_of();
        parent.insert_set(set_key.clone(), vec![Arc::new(1i64)]);

        let child = parent.create_subcontext();
        assert_eq!(child.get_set(&set_key).unwrap().len(), 1);

        child.insert_set(set_key.clone(), vec![Arc::new(2i64)]);
        assert_eq!(child.get_set(&set_key).unwrap().len(), 2);
        assert_eq!(parent.get_set(&set_key).unwrap().len(), 1);
    }

    #[test]
    fn missing_key_is_absent_everywhere() {
        let locator = Locator::new();
        assert!(!locator.has(&Key::of::<i64>()));
        assert!(locator.find(&Key::of::<i64>()).is_none());
    }

    #[test]
    fn close_is_infallible() {
        let locator = Locator::new();
        assert!(locator.close().is_ok());
    }
}
