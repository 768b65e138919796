//! Process-wide index instances keyed by root path.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::index::{SearchHit, SearchIndex};

static INSTANCES: Lazy<Registry> = Lazy::new(Registry::new);

/// Lazily built indexes, one per key.
///
/// The map lock is only held long enough to find or insert a key's slot;
/// building an index happens inside that slot, so lookups of other keys
/// never wait on it. Concurrent first requests for the same key all get
/// the instance built by whichever of them ran the constructor.
#[derive(Default)]
pub struct Registry {
    instances: RwLock<HashMap<String, Arc<OnceCell<Arc<SearchIndex>>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for `root`, building it with `init` on first use.
    ///
    /// An empty `root` is treated as `/`. `init` receives the normalized key.
    pub fn get_or_insert_with<F>(&self, root: &str, init: F) -> Arc<SearchIndex>
    where
        F: FnOnce(&str) -> SearchIndex,
    {
        let key = if root.is_empty() { "/" } else { root };

        let existing = self.instances.read().get(key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self
                .instances
                .write()
                .entry(key.to_string())
                .or_default()
                .clone(),
        };

        slot.get_or_init(|| {
            debug!("Creating search index for {}", key);
            Arc::new(init(key))
        })
        .clone()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Forgets every instance. Indexes already handed out stay usable.
    pub fn clear(&self) {
        self.instances.write().clear();
    }
}

/// Returns the shared index for `root`.
///
/// The `cache` flag only matters on the first call for a given root;
/// later calls get the existing instance whatever they pass.
pub fn get(root: &str, cache: bool) -> Arc<SearchIndex> {
    INSTANCES.get_or_insert_with(root, |key| SearchIndex::new(key, cache))
}

/// Searches `name` under `root` without caching.
///
/// `root` should be absolute; it is used as the registry key as given.
pub fn search(root: &str, name: &str, index_files: &[&str]) -> Option<SearchHit> {
    get(root, false).search(name, index_files)
}

/// Searches `name` under `root` using a cached index.
///
/// The first call for a root scans it completely.
pub fn search_with_cache(root: &str, name: &str, index_files: &[&str]) -> Option<SearchHit> {
    get(root, true).search(name, index_files)
}

/// Drops all shared instances, mainly for tests.
pub fn reset_instances() {
    INSTANCES.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let registry = Arc::new(Registry::new());
        let built = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let built = Arc::clone(&built);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_insert_with("/root", |key| {
                        built.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        SearchIndex::new(key, false)
                    })
                })
            })
            .collect();

        let instances: Vec<Arc<SearchIndex>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_root_is_slash() {
        let registry = Registry::new();
        let a = registry.get_or_insert_with("", |key| {
            assert_eq!(key, "/");
            SearchIndex::new("", false)
        });
        let b = registry.get_or_insert_with("/", |_| unreachable!());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_clear_forgets_instances() {
        let registry = Registry::new();
        let a = registry.get_or_insert_with("/a", |_| SearchIndex::new("", false));
        registry.clear();
        assert!(registry.is_empty());

        let b = registry.get_or_insert_with("/a", |_| SearchIndex::new("", false));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_first_cache_flag_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let key = root.to_str().unwrap();

        let first = get(key, true);
        let second = get(key, false);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_cached());
    }

    #[test]
    fn test_package_search_helpers() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs/index.html"), "<html/>").unwrap();

        let plain_root = root.to_str().unwrap().to_string();
        let hit = search(&plain_root, "docs", &["index.html"]).unwrap();
        assert_eq!(hit.path, root.join("docs/index.html"));
        assert!(!hit.is_dir);

        // A different key so the cached variant gets its own instance.
        let cached_root = format!("{}/", plain_root);
        let hit = search_with_cache(&cached_root, "docs", &[]).unwrap();
        assert_eq!(hit.path, root.join("docs"));
        assert!(hit.is_dir);
        assert!(search_with_cache(&cached_root, "missing", &[]).is_none());
    }
}
