//! In-memory cache of resolved names.
//!
//! Keys are normalized logical names (see [`cache_key`]); values record the
//! absolute path a name resolved to and whether it is a directory. The store
//! has its own reader/writer lock, independent of whatever guards the list
//! of search directories.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;

/// Raw map type handed to [`CacheStore::batch`].
pub type CacheMap = HashMap<String, CacheEntry>;

/// A resolved search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path of the file or directory.
    pub path: PathBuf,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

impl CacheEntry {
    pub fn new(path: PathBuf, is_dir: bool) -> Self {
        Self { path, is_dir }
    }
}

/// Normalizes a logical name into the cache key format.
///
/// Keys always start with `/` and never end with one. Empty and `.`
/// components are dropped, so `""`, `"."` and `"./"` all map to `/`,
/// and `"./a//b/"` maps to `/a/b`. `..` removes the previous component;
/// a name that climbs above the root has no key and returns `None`.
pub fn cache_key(name: &str) -> Option<String> {
    #[cfg(windows)]
    let name = name.replace('\\', "/");
    #[cfg(windows)]
    let name = name.as_str();

    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Some("/".to_string());
    }

    let mut key = String::with_capacity(name.len() + 1);
    for part in parts {
        key.push('/');
        key.push_str(part);
    }
    Some(key)
}

/// Returns true if `key` is `parent` or a descendant of it.
pub fn key_within(key: &str, parent: &str) -> bool {
    if parent == "/" {
        return true;
    }
    key == parent
        || (key.len() > parent.len()
            && key.starts_with(parent)
            && key.as_bytes()[parent.len()] == b'/')
}

/// Removes `prefix` and every key below it from `entries`.
///
/// Returns the removed keys.
pub fn remove_prefix(entries: &mut CacheMap, prefix: &str) -> Vec<String> {
    let removed: Vec<String> = entries
        .keys()
        .filter(|key| key_within(key, prefix))
        .cloned()
        .collect();
    for key in &removed {
        entries.remove(key);
    }
    removed
}

/// Thread-safe map from cache key to [`CacheEntry`].
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<CacheMap>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key. The key is expected to be normalized already.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Inserts or replaces an entry.
    pub fn set(&self, key: String, entry: CacheEntry) {
        self.entries.write().insert(key, entry);
    }

    /// Merges many entries under one write lock, keeping existing keys.
    ///
    /// Returns the number of entries inserted.
    pub fn extend_if_absent(&self, items: impl IntoIterator<Item = (String, CacheEntry)>) -> usize {
        let mut entries = self.entries.write();
        let mut inserted = 0;
        for (key, entry) in items {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(key) {
                slot.insert(entry);
                inserted += 1;
            }
        }
        inserted
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns every key, sorted lexicographically.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Runs `f` with exclusive access to the underlying map.
    ///
    /// Used for multi-key updates that must not interleave with other
    /// writers, such as applying a filesystem change event.
    pub fn batch<R>(&self, f: impl FnOnce(&mut CacheMap) -> R) -> R {
        f(&mut self.entries.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> CacheEntry {
        CacheEntry::new(path.into(), false)
    }

    fn dir(path: &str) -> CacheEntry {
        CacheEntry::new(path.into(), true)
    }

    fn key(name: &str) -> String {
        cache_key(name).unwrap()
    }

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(key(""), "/");
        assert_eq!(key("/"), "/");
        assert_eq!(key("."), "/");
        assert_eq!(key("./"), "/");
        assert_eq!(key("a.txt"), "/a.txt");
        assert_eq!(key("a.txt/"), "/a.txt");
        assert_eq!(key("/a/b/"), "/a/b");
        assert_eq!(key("./a//b/./c"), "/a/b/c");
        // Dotfiles keep their leading dot.
        assert_eq!(key(".env"), "/.env");
    }

    #[test]
    fn test_cache_key_parent_components() {
        assert_eq!(key("sub/../f.txt"), "/f.txt");
        assert_eq!(key("a/b/../../c"), "/c");
        assert_eq!(key("a/.."), "/");
        assert_eq!(key("..."), "/...");

        assert_eq!(cache_key(".."), None);
        assert_eq!(cache_key("../f.txt"), None);
        assert_eq!(cache_key("a/../../f.txt"), None);
    }

    #[test]
    fn test_key_within() {
        assert!(key_within("/a", "/a"));
        assert!(key_within("/a/b", "/a"));
        assert!(!key_within("/ab", "/a"));
        assert!(key_within("/anything", "/"));
    }

    #[test]
    fn test_extend_if_absent() {
        let store = CacheStore::new();
        store.set("/a".into(), dir("/one/a"));

        let inserted = store.extend_if_absent(vec![
            ("/a".to_string(), dir("/two/a")),
            ("/b".to_string(), file("/two/b")),
        ]);

        assert_eq!(inserted, 1);
        assert_eq!(store.get("/a").unwrap().path, PathBuf::from("/one/a"));
        assert!(store.get("/b").is_some());

        store.set("/a".into(), dir("/two/a"));
        assert_eq!(store.get("/a").unwrap().path, PathBuf::from("/two/a"));
    }

    #[test]
    fn test_remove_prefix() {
        let store = CacheStore::new();
        store.set("/a".into(), dir("/r/a"));
        store.set("/a/b".into(), dir("/r/a/b"));
        store.set("/a/b/c.txt".into(), file("/r/a/b/c.txt"));
        store.set("/ab".into(), file("/r/ab"));

        let mut removed = store.batch(|entries| remove_prefix(entries, "/a/b"));
        removed.sort();
        assert_eq!(removed, vec!["/a/b", "/a/b/c.txt"]);
        assert_eq!(store.keys(), vec!["/a", "/ab"]);

        // Sibling names sharing a prefix stay.
        assert_eq!(store.batch(|entries| remove_prefix(entries, "/a")), vec!["/a"]);
        assert_eq!(store.keys(), vec!["/ab"]);
        assert!(store.batch(|entries| remove_prefix(entries, "/missing")).is_empty());
    }

    #[test]
    fn test_keys_sorted_and_remove() {
        let store = CacheStore::new();
        store.set("/b".into(), file("/r/b"));
        store.set("/a/c".into(), file("/r/a/c"));
        store.set("/a".into(), dir("/r/a"));

        assert_eq!(store.keys(), vec!["/a", "/a/c", "/b"]);
        assert_eq!(store.len(), 3);

        assert!(store.remove("/a/c").is_some());
        assert!(store.remove("/a/c").is_none());
        assert!(store.get("/a/c").is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_batch_updates_under_one_lock() {
        let store = CacheStore::new();
        store.set("/gone".into(), file("/r/gone"));

        let removed = store.batch(|entries| {
            entries.insert("/new".into(), file("/r/new"));
            remove_prefix(entries, "/gone")
        });

        assert_eq!(removed, vec!["/gone"]);
        assert_eq!(store.keys(), vec!["/new"]);
    }
}
