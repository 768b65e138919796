//! File watcher for live cache updates.
//!
//! Uses the notify crate to watch search roots and forwards created,
//! removed and renamed paths as [`FileChange`] messages. Content edits
//! are dropped since they never change what a name resolves to.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use spath_core::path::exists;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::error::WatchError;

/// A structural change below a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Created(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Handle returned by [`ChangeNotifier::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Source of filesystem change events.
///
/// Implementations only know about directory paths. Events are delivered
/// out of band (for [`FsNotifier`], through the channel it was built with).
pub trait ChangeNotifier: Send {
    /// Starts watching `dir` recursively.
    fn watch(&mut self, dir: &Path) -> Result<WatchId, WatchError>;

    /// Stops a watch. Unknown ids are ignored.
    fn unwatch(&mut self, id: WatchId);
}

/// [`ChangeNotifier`] backed by the platform's recommended watcher.
pub struct FsNotifier {
    watcher: notify::RecommendedWatcher,
    watched: HashMap<WatchId, PathBuf>,
    next_id: u64,
}

impl FsNotifier {
    /// Creates a notifier that sends every change to `sender`.
    pub fn new(sender: Sender<FileChange>) -> Result<Self, WatchError> {
        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for change in translate_event(event) {
                        debug!("File change: {:?}", change);
                        if sender.send(change).is_err() {
                            // Receiver is gone, nobody is listening anymore.
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })?;

        Ok(Self {
            watcher,
            watched: HashMap::new(),
            next_id: 0,
        })
    }

    /// Number of active watches.
    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }
}

impl ChangeNotifier for FsNotifier {
    fn watch(&mut self, dir: &Path) -> Result<WatchId, WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        let id = WatchId::new(self.next_id);
        self.next_id += 1;
        self.watched.insert(id, dir.to_path_buf());

        info!("Watching {} for changes", dir.display());
        Ok(id)
    }

    fn unwatch(&mut self, id: WatchId) {
        let Some(dir) = self.watched.remove(&id) else {
            return;
        };
        if let Err(e) = self.watcher.unwatch(&dir) {
            warn!("Failed to unwatch {}: {}", dir.display(), e);
        } else {
            debug!("Stopped watching {}", dir.display());
        }
    }
}

/// Maps a raw notify event to the changes the cache cares about.
pub fn translate_event(event: Event) -> Vec<FileChange> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(FileChange::Created).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(FileChange::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() == 2 => {
                let mut paths = event.paths.into_iter();
                match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => vec![FileChange::Renamed { from, to }],
                    _ => Vec::new(),
                }
            }
            RenameMode::From => event.paths.into_iter().map(FileChange::Removed).collect(),
            RenameMode::To => event.paths.into_iter().map(FileChange::Created).collect(),
            // Backends that can't pair the two halves of a rename report
            // each side separately; whether the path still exists says which.
            _ => event
                .paths
                .into_iter()
                .map(|path| {
                    if exists(&path) {
                        FileChange::Created(path)
                    } else {
                        FileChange::Removed(path)
                    }
                })
                .collect(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::fs;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_translate_create_and_remove() {
        let changes = translate_event(event(EventKind::Create(CreateKind::File), &["/r/a"]));
        assert_eq!(changes, vec![FileChange::Created("/r/a".into())]);

        let changes = translate_event(event(EventKind::Remove(RemoveKind::Any), &["/r/a"]));
        assert_eq!(changes, vec![FileChange::Removed("/r/a".into())]);
    }

    #[test]
    fn test_translate_rename() {
        let changes = translate_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/old", "/r/new"],
        ));
        assert_eq!(
            changes,
            vec![FileChange::Renamed {
                from: "/r/old".into(),
                to: "/r/new".into()
            }]
        );

        let changes = translate_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/r/old"],
        ));
        assert_eq!(changes, vec![FileChange::Removed("/r/old".into())]);
    }

    #[test]
    fn test_translate_ignores_content_changes() {
        let changes = translate_event(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a"],
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_watch_and_unwatch() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = channel();
        let mut notifier = FsNotifier::new(tx).unwrap();

        let id = notifier.watch(dir.path()).unwrap();
        assert_eq!(notifier.len(), 1);

        notifier.unwatch(id);
        assert!(notifier.is_empty());

        // Second unwatch is a no-op.
        notifier.unwatch(id);
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = channel();
        let mut notifier = FsNotifier::new(tx).unwrap();

        let result = notifier.watch(&dir.path().join("missing"));
        assert!(matches!(result, Err(WatchError::PathWatchFailed { .. })));
    }

    #[test]
    fn test_watcher_reports_created_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, rx) = channel();
        let mut notifier = FsNotifier::new(tx).unwrap();
        notifier.watch(&root).unwrap();

        let file_path = root.join("created.txt");
        fs::write(&file_path, "hello").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(FileChange::Created(path)) if path.ends_with("created.txt") => {
                    seen = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(seen, "expected a create event for {}", file_path.display());
    }
}
