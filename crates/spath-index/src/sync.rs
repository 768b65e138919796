//! Keeping the cache in line with the filesystem.
//!
//! Every change is handled by recomputing the affected keys: each key is
//! resolved again against all search directories in priority order and
//! either stored or dropped. Removing a file from an early directory thus
//! uncovers the same name in a later one, if it has it.

use spath_core::cache::remove_prefix;
use spath_core::path::{is_dir, is_within, name_from_path};
use spath_core::CacheEntry;
use spath_watcher::{scan_path, FileChange, ScanOptions};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Weak;
use std::thread;
use tracing::{debug, trace, warn};

use crate::index::{search_directories, IndexState};

/// Applies events from `events` until the channel closes or the index
/// behind `state` is dropped.
pub(crate) fn spawn_dispatcher(state: Weak<IndexState>, events: Receiver<FileChange>) {
    let spawned = thread::Builder::new()
        .name("spath-events".to_string())
        .spawn(move || {
            for change in events.iter() {
                let Some(state) = state.upgrade() else {
                    break;
                };
                state.apply_change(&change);
            }
            debug!("Event dispatcher stopped");
        });

    if let Err(e) = spawned {
        warn!("Failed to start event dispatcher, cache will not follow changes: {}", e);
    }
}

impl IndexState {
    pub(crate) fn apply_change(&self, change: &FileChange) {
        if self.defer(change) {
            return;
        }
        match change {
            FileChange::Created(path) => self.refresh(path, true),
            FileChange::Removed(path) => self.refresh(path, false),
            FileChange::Renamed { from, to } => {
                self.refresh(from, false);
                self.refresh(to, true);
            }
        }
    }

    /// Marks `dir` as watched but not yet searchable.
    pub(crate) fn begin_registration(&self, dir: &Path) {
        let mut pending = self.pending.lock();
        pending.dir = Some(dir.to_path_buf());
        pending.deferred.clear();
    }

    /// Replays the changes held back since [`Self::begin_registration`].
    ///
    /// Must be called after `dir` has been committed and without holding
    /// the directories or cache locks.
    pub(crate) fn finish_registration(&self, dir: &Path) {
        let deferred = {
            let mut pending = self.pending.lock();
            if pending.dir.as_deref() != Some(dir) {
                return;
            }
            pending.dir = None;
            std::mem::take(&mut pending.deferred)
        };
        if !deferred.is_empty() {
            debug!("Replaying {} changes below {}", deferred.len(), dir.display());
        }
        for change in &deferred {
            self.apply_change(change);
        }
    }

    /// Holds `change` back if it touches the directory being registered.
    fn defer(&self, change: &FileChange) -> bool {
        let mut guard = self.pending.lock();
        let pending = &mut *guard;
        let Some(dir) = pending.dir.as_deref() else {
            return false;
        };
        let touches = match change {
            FileChange::Created(path) | FileChange::Removed(path) => is_within(path, dir),
            FileChange::Renamed { from, to } => is_within(from, dir) || is_within(to, dir),
        };
        if touches {
            trace!("Deferring {:?} until {} is registered", change, dir.display());
            pending.deferred.push(change.clone());
        }
        touches
    }

    fn refresh(&self, path: &Path, created: bool) {
        let Some(cache) = &self.cache else {
            return;
        };

        // Holding the read lock keeps `set` from clearing the cache under us.
        let directories = self.directories.read();

        let mut keys = BTreeSet::new();
        for dir in directories.iter() {
            let Some(key) = name_from_path(path, dir) else {
                continue;
            };
            if created && is_dir(path) {
                let scanned = scan_path(dir, path, &ScanOptions::default());
                keys.extend(scanned.entries.into_iter().map(|(key, _)| key));
            }
            keys.insert(key);
        }

        if keys.is_empty() {
            trace!("Ignoring change outside search directories: {}", path.display());
            return;
        }

        cache.batch(|entries| {
            if !created {
                // Everything cached below a removed name goes too, unless
                // another directory still provides it.
                let removed: Vec<String> = keys
                    .iter()
                    .flat_map(|key| remove_prefix(entries, key))
                    .collect();
                keys.extend(removed);
            }

            for key in keys {
                match search_directories(&directories, &key) {
                    Some((hit, _)) => {
                        trace!("Cache {} -> {}", key, hit.path.display());
                        entries.insert(key, CacheEntry::new(hit.path, hit.is_dir));
                    }
                    None => {
                        if entries.remove(&key).is_some() {
                            trace!("Cache {} dropped", key);
                        }
                    }
                }
            }
        });
    }
}
