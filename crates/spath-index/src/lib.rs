//! spath Index - search files across an ordered list of directories
//!
//! Directories are searched in the order they were added, so earlier
//! directories shadow later ones. An index can optionally keep every
//! name it can resolve in memory; that cache is kept current by
//! filesystem change events instead of being checked on each lookup,
//! so a cached index may lag briefly behind files being added or removed.
//!
//! # Example
//!
//! ```no_run
//! use spath_index::SearchIndex;
//!
//! let index = SearchIndex::new("/srv/www", false);
//! index.add("/srv/shared").unwrap();
//!
//! if let Some(hit) = index.search("docs", &["index.html"]) {
//!     println!("{} (dir: {})", hit.path.display(), hit.is_dir);
//! }
//! ```

mod index;
mod registry;
mod sync;

pub use index::{SearchHit, SearchIndex};
pub use registry::{get, reset_instances, search, search_with_cache, Registry};
pub use spath_core::{Result, SpathError};
pub use spath_watcher::{ChangeNotifier, FileChange, WatchError, WatchId};
