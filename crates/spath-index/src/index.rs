//! The search index.
//!
//! A [`SearchIndex`] owns an ordered list of root directories and, when
//! caching is enabled, a [`CacheStore`] filled by scanning each root and
//! kept current by a [`ChangeNotifier`].

use parking_lot::{Mutex, RwLock};
use spath_core::path::{
    exists, is_dir, is_within, join, name_from_path, real_path, real_path_from_cwd, stat,
    trim_separator,
};
use spath_core::{cache_key, CacheEntry, CacheStore, Result, SpathError};
use spath_watcher::{scan_directory, ChangeNotifier, FileChange, FsNotifier, ScanOptions, WatchId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::sync;

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Absolute path of the match.
    pub path: PathBuf,
    /// Whether the match is a directory.
    pub is_dir: bool,
}

impl From<CacheEntry> for SearchHit {
    fn from(entry: CacheEntry) -> Self {
        Self {
            path: entry.path,
            is_dir: entry.is_dir,
        }
    }
}

/// State shared with the event dispatcher.
///
/// The dispatcher only holds a `Weak` to this, so dropping the index
/// stops event processing.
pub(crate) struct IndexState {
    /// Search roots in priority order.
    pub(crate) directories: RwLock<Vec<PathBuf>>,
    /// `None` when caching is disabled.
    pub(crate) cache: Option<CacheStore>,
    /// Directory being registered and the changes seen below it so far.
    pub(crate) pending: Mutex<Pending>,
}

impl IndexState {
    pub(crate) fn new(cache: Option<CacheStore>) -> Self {
        Self {
            directories: RwLock::new(Vec::new()),
            cache,
            pending: Mutex::new(Pending::default()),
        }
    }
}

/// Changes held back while a directory is watched but not yet searchable.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub(crate) dir: Option<PathBuf>,
    pub(crate) deferred: Vec<FileChange>,
}

/// Watch bookkeeping. Its mutex also serializes `add` and `set`.
struct Watches {
    notifier: Option<Box<dyn ChangeNotifier>>,
    ids: HashMap<PathBuf, WatchId>,
}

/// How `add`/`set` found the directory they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// The path resolved as given.
    Absolute,
    /// The path was found as a name inside a registered directory.
    Registered,
    /// The path resolved relative to the working directory.
    WorkingDir,
}

/// Searches files across an ordered list of directories.
pub struct SearchIndex {
    state: Arc<IndexState>,
    watches: Mutex<Watches>,
}

impl SearchIndex {
    /// Creates an index, registering `path` as its first directory.
    ///
    /// An empty `path` creates an index with no directories. A `path` that
    /// can't be registered is logged and skipped; use [`SearchIndex::add`]
    /// to see the error. With `cache` set, changes below the registered
    /// directories are picked up through the platform file watcher.
    pub fn new(path: &str, cache: bool) -> Self {
        if !cache {
            return Self::build(None, None).with_initial(path);
        }

        let (sender, events) = channel();
        match FsNotifier::new(sender) {
            Ok(notifier) => Self::with_notifier(path, Box::new(notifier), events),
            Err(e) => {
                warn!("File watcher unavailable, cache will not follow changes: {}", e);
                Self::build(Some(CacheStore::new()), None).with_initial(path)
            }
        }
    }

    /// Creates a caching index fed by a custom notifier.
    ///
    /// `events` must receive the changes `notifier` detects; they are
    /// applied on a background thread.
    pub fn with_notifier(
        path: &str,
        notifier: Box<dyn ChangeNotifier>,
        events: Receiver<FileChange>,
    ) -> Self {
        let index = Self::build(Some(CacheStore::new()), Some(notifier));
        sync::spawn_dispatcher(Arc::downgrade(&index.state), events);
        index.with_initial(path)
    }

    fn build(cache: Option<CacheStore>, notifier: Option<Box<dyn ChangeNotifier>>) -> Self {
        Self {
            state: Arc::new(IndexState::new(cache)),
            watches: Mutex::new(Watches {
                notifier,
                ids: HashMap::new(),
            }),
        }
    }

    fn with_initial(self, path: &str) -> Self {
        if !path.is_empty() {
            if let Err(e) = self.add(path) {
                debug!("Initial directory not registered: {}", e);
            }
        }
        self
    }

    /// Appends a search directory.
    ///
    /// `path` may be absolute, a name inside an already registered
    /// directory, or relative to the working directory, tried in that
    /// order. Adding a registered directory again is a no-op. Returns the
    /// canonical directory path.
    pub fn add(&self, path: &str) -> Result<PathBuf> {
        self.register(path, false)
    }

    /// Replaces all search directories with `path`.
    ///
    /// Watches and cache entries of the previous directories are dropped.
    /// On error the index is left untouched.
    pub fn set(&self, path: &str) -> Result<PathBuf> {
        self.register(path, true)
    }

    fn register(&self, path: &str, replace: bool) -> Result<PathBuf> {
        let dir = self.resolve_directory(path)?;

        if !replace && self.state.directories.read().contains(&dir) {
            debug!("{} is already registered", dir.display());
            return Ok(dir);
        }

        let mut guard = self.watches.lock();
        let watches = &mut *guard;
        if !replace && self.state.directories.read().contains(&dir) {
            return Ok(dir);
        }

        if replace {
            // Unwatch first so no event for an old root lands after the clear.
            let old: Vec<WatchId> = watches.ids.drain().map(|(_, id)| id).collect();
            if let Some(notifier) = watches.notifier.as_mut() {
                for id in old {
                    notifier.unwatch(id);
                }
            }
        }

        // Watch before scanning. Changes that arrive until the commit below
        // are held back and replayed once the directory is searchable.
        self.state.begin_registration(&dir);
        if let Some(notifier) = watches.notifier.as_mut() {
            match notifier.watch(&dir) {
                Ok(id) => {
                    watches.ids.insert(dir.clone(), id);
                }
                Err(e) => warn!("Cache for {} will not follow changes: {}", dir.display(), e),
            }
        }

        // Readers keep going while the scan runs.
        let scanned = self
            .state
            .cache
            .as_ref()
            .map(|_| scan_directory(&dir, &ScanOptions::default()).entries);

        {
            let mut directories = self.state.directories.write();
            if replace {
                directories.clear();
                if let Some(cache) = &self.state.cache {
                    cache.clear();
                }
            }

            directories.push(dir.clone());
            if let (Some(cache), Some(entries)) = (&self.state.cache, scanned) {
                // Earlier directories win, so existing keys stay.
                let inserted = cache.extend_if_absent(entries);
                debug!("Cached {} entries from {}", inserted, dir.display());
            }
        }
        self.state.finish_registration(&dir);

        info!(
            "{} search directory {}",
            if replace { "Set" } else { "Added" },
            dir.display()
        );
        Ok(dir)
    }

    fn resolve_directory(&self, path: &str) -> Result<PathBuf> {
        let path = trim_separator(path);
        let (resolved, how) = self.resolve(path).ok_or_else(|| SpathError::NotFound {
            path: path.to_string(),
        })?;
        trace!("Resolved {:?} to {} ({:?})", path, resolved.display(), how);

        if !is_dir(&resolved) {
            return Err(SpathError::NotADirectory { path: resolved });
        }
        Ok(resolved)
    }

    fn resolve(&self, path: &str) -> Option<(PathBuf, Resolution)> {
        if let Some(resolved) = real_path(path) {
            return Some((resolved, Resolution::Absolute));
        }
        if let Some(hit) = self.search(path, &[]) {
            return Some((hit.path, Resolution::Registered));
        }
        real_path_from_cwd(path).map(|resolved| (resolved, Resolution::WorkingDir))
    }

    /// Resolves `name` against the search directories.
    ///
    /// The first directory containing `name` wins. If the match is a
    /// directory, `index_files` are tried inside it in order and the first
    /// existing file is returned instead. Returns `None` if nothing matches.
    ///
    /// With caching enabled only the cache is consulted, so files created
    /// moments ago may not be found yet.
    pub fn search(&self, name: &str, index_files: &[&str]) -> Option<SearchHit> {
        match &self.state.cache {
            Some(cache) => search_cache(cache, name, index_files),
            None => {
                let key = cache_key(name)?;
                let directories = self.state.directories.read();
                let (hit, root) = search_directories(&directories, &key)?;
                if hit.is_dir {
                    if let Some(index) = find_index_file(&hit.path, root, index_files) {
                        return Some(index);
                    }
                }
                Some(hit)
            }
        }
    }

    /// Drops a cached name.
    ///
    /// `path` may be an absolute path below a search directory or a
    /// logical name. Does nothing when caching is disabled.
    pub fn remove(&self, path: &str) {
        let Some(cache) = &self.state.cache else {
            return;
        };

        let mut keys = Vec::new();
        if exists(path) {
            let given = Path::new(path);
            let resolved = real_path(given);
            for dir in self.state.directories.read().iter() {
                let key = name_from_path(given, dir)
                    .or_else(|| resolved.as_deref().and_then(|p| name_from_path(p, dir)));
                keys.extend(key);
            }
        }
        if keys.is_empty() {
            keys.extend(cache_key(path));
        }

        for key in keys {
            if cache.remove(&key).is_some() {
                debug!("Removed {} from cache", key);
            }
        }
    }

    /// Applies a filesystem change to the cache right away.
    ///
    /// The background dispatcher calls this for every event; it is public
    /// for callers that deliver events themselves.
    pub fn apply_change(&self, change: &FileChange) {
        self.state.apply_change(change);
    }

    /// Search directories in priority order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.directories.read().clone()
    }

    /// All cached names, sorted. Empty when caching is disabled.
    pub fn all_paths(&self) -> Vec<String> {
        self.state
            .cache
            .as_ref()
            .map(CacheStore::keys)
            .unwrap_or_default()
    }

    /// Number of search directories.
    pub fn size(&self) -> usize {
        self.state.directories.read().len()
    }

    pub fn is_cached(&self) -> bool {
        self.state.cache.is_some()
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("directories", &*self.state.directories.read())
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// Finds the normalized `key` in the first directory that has it.
///
/// Candidates whose real path leaves their directory through a symlink
/// are skipped, as are candidates that fail to resolve.
pub(crate) fn search_directories<'a>(
    directories: &'a [PathBuf],
    key: &str,
) -> Option<(SearchHit, &'a Path)> {
    for dir in directories {
        let candidate = join(dir, key);
        let Some(resolved) = real_path(&candidate) else {
            continue;
        };
        if !is_within(&resolved, dir) {
            trace!(
                "Rejected {} -> {} (outside {})",
                candidate.display(),
                resolved.display(),
                dir.display()
            );
            continue;
        }
        let Ok(metadata) = stat(&resolved) else {
            continue;
        };
        let hit = SearchHit {
            path: resolved,
            is_dir: metadata.is_dir(),
        };
        return Some((hit, dir.as_path()));
    }
    None
}

fn find_index_file(dir: &Path, root: &Path, index_files: &[&str]) -> Option<SearchHit> {
    index_files.iter().find_map(|file| {
        let resolved = real_path(join(dir, file))?;
        (is_within(&resolved, root) && !is_dir(&resolved)).then(|| SearchHit {
            path: resolved,
            is_dir: false,
        })
    })
}

fn search_cache(cache: &CacheStore, name: &str, index_files: &[&str]) -> Option<SearchHit> {
    let key = cache_key(name)?;
    let entry = cache.get(&key)?;
    if entry.is_dir {
        for file in index_files {
            let index_key = cache_key(&format!("{}/{}", key, file));
            match index_key.and_then(|index_key| cache.get(&index_key)) {
                Some(index) if !index.is_dir => return Some(index.into()),
                _ => {}
            }
        }
    }
    Some(entry.into())
}
