//! spath Watcher - directory scanning and change notification
//!
//! This crate handles the file system side of things:
//! - Walking a search root to fill the cache
//! - Watching roots for created, removed and renamed entries
//! - Turning raw watcher events into [`FileChange`] messages
//!
//! It never touches the search index directly; changes flow out through
//! a channel keyed only by path.

mod error;
mod indexer;
mod watcher;

pub use error::WatchError;
pub use indexer::{scan_directory, scan_path, ScanOptions, ScanResult};
pub use watcher::{translate_event, ChangeNotifier, FileChange, FsNotifier, WatchId};
