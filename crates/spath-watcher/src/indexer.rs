//! Directory scanning.
//!
//! Walks a search root and produces one cache entry per file and
//! directory found, keyed by its name relative to the root. Entries
//! whose real path lies outside the root (symlinks pointing elsewhere)
//! are left out so the cache never hands them back.

use spath_core::path::{is_dir, is_within, name_from_path, real_path};
use spath_core::CacheEntry;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Result of scanning a directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// `(cache key, entry)` pairs in walk order.
    pub entries: Vec<(String, CacheEntry)>,

    /// Entries skipped because they resolve outside the root.
    pub escaped: usize,

    /// Entries that could not be read.
    pub errors: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Options for directory scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Follow symbolic links when walking. Links that resolve outside
    /// the root are still excluded. On by default so the cache sees the
    /// same names an uncached lookup would.
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
        }
    }
}

/// Scans `root` recursively, including `root` itself under key `/`.
///
/// `root` should already be canonical.
///
/// # Example
///
/// ```no_run
/// use spath_watcher::{scan_directory, ScanOptions};
/// use std::path::Path;
///
/// let result = scan_directory(Path::new("/srv/www"), &ScanOptions::default());
/// println!("Cached {} entries", result.entries.len());
/// ```
pub fn scan_directory(root: &Path, options: &ScanOptions) -> ScanResult {
    let result = scan_path(root, root, options);
    info!(
        "Scanned {}: {} entries ({} outside root, {} unreadable) in {}ms",
        root.display(),
        result.entries.len(),
        result.escaped,
        result.errors,
        result.duration_ms
    );
    result
}

/// Scans the subtree at `start`, keying entries relative to `root`.
///
/// Used when a directory appears below an already scanned root.
pub fn scan_path(root: &Path, start: &Path, options: &ScanOptions) -> ScanResult {
    let started = Instant::now();
    let mut result = ScanResult::default();

    let mut walker = WalkDir::new(start)
        .follow_links(options.follow_symlinks)
        .into_iter();

    while let Some(item) = walker.next() {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                result.errors += 1;
                continue;
            }
        };

        let Some(key) = name_from_path(entry.path(), root) else {
            result.escaped += 1;
            continue;
        };

        let Some(resolved) = real_path(entry.path()) else {
            // Dangling symlink or removed mid-walk.
            result.errors += 1;
            continue;
        };

        if !is_within(&resolved, root) {
            trace!(
                "Skipping {} -> {} (outside {})",
                entry.path().display(),
                resolved.display(),
                root.display()
            );
            result.escaped += 1;
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let entry_is_dir = is_dir(&resolved);
        result.entries.push((key, CacheEntry::new(resolved, entry_is_dir)));
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}
