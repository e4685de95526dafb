//! Metadata cache.
//!
//! The cache wraps the whole resolution chain. Entries are written once per class and
//! never mutated afterwards, so concurrent readers only ever see fully resolved
//! descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::MetadataResult;
use crate::resource::ResourceDescriptor;

/// Computes a descriptor on a cache miss.
pub type ComputeFn<'a> = &'a dyn Fn() -> MetadataResult<Arc<ResourceDescriptor>>;

/// Process-wide store of resolved descriptors, keyed by class name.
pub trait MetadataCache: Send + Sync {
    /// Returns the cached descriptor for `key`, computing and storing it on a miss.
    ///
    /// When two callers race on the same key, the first stored value wins and both
    /// receive it. Errors are never cached.
    fn get_or_compute(
        &self,
        key: &str,
        compute: ComputeFn<'_>,
    ) -> MetadataResult<Arc<ResourceDescriptor>>;

    /// Drops the entry for `key`.
    fn invalidate(&self, key: &str);

    /// Drops every entry.
    fn clear(&self);
}

/// In-memory cache backed by a `parking_lot` read/write lock.
#[derive(Debug, Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<HashMap<String, Arc<ResourceDescriptor>>>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl MetadataCache for InMemoryMetadataCache {
    fn get_or_compute(
        &self,
        key: &str,
        compute: ComputeFn<'_>,
    ) -> MetadataResult<Arc<ResourceDescriptor>> {
        if let Some(hit) = self.entries.read().get(key) {
            trace!(class = key, "Metadata cache hit");
            return Ok(Arc::clone(hit));
        }

        // Computed outside the lock: resolution may itself look up other classes.
        let computed = compute()?;

        let mut entries = self.entries.write();
        let stored = entries
            .entry(key.to_string())
            .or_insert_with(|| computed);
        Ok(Arc::clone(stored))
    }

    fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetadataCache;

impl MetadataCache for NoopMetadataCache {
    fn get_or_compute(
        &self,
        _key: &str,
        compute: ComputeFn<'_>,
    ) -> MetadataResult<Arc<ResourceDescriptor>> {
        compute()
    }

    fn invalidate(&self, _key: &str) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_in_memory_cache_computes_once() {
        let cache = InMemoryMetadataCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ResourceDescriptor::new("Company")))
        };

        let first = cache.get_or_compute("Company", &compute).unwrap();
        let second = cache.get_or_compute("Company", &compute).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = InMemoryMetadataCache::new();
        let failing = || Err(MetadataError::not_supported("Ghost"));
        assert!(cache.get_or_compute("Ghost", &failing).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = InMemoryMetadataCache::new();
        let compute = || Ok(Arc::new(ResourceDescriptor::new("Company")));
        let first = cache.get_or_compute("Company", &compute).unwrap();

        cache.invalidate("Company");
        assert!(!cache.contains("Company"));

        let second = cache.get_or_compute("Company", &compute).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_noop_cache_recomputes() {
        let cache = NoopMetadataCache;
        let compute = || Ok(Arc::new(ResourceDescriptor::new("Company")));
        let first = cache.get_or_compute("Company", &compute).unwrap();
        let second = cache.get_or_compute("Company", &compute).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
