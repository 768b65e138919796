//! Path helpers over the OS primitives.
//!
//! Everything here is stateless. Functions that query the filesystem
//! report absence through `Option`/`bool` rather than errors, since a
//! missing path is the common case when searching several roots.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::cache::cache_key;

/// Resolves `path` to an absolute path with symlinks and `..` resolved.
///
/// Returns `None` if the path does not exist.
pub fn real_path(path: impl AsRef<Path>) -> Option<PathBuf> {
    fs::canonicalize(path).ok()
}

/// Resolves `path` relative to the process working directory.
pub fn real_path_from_cwd(path: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    real_path(cwd.join(path.trim_start_matches(is_separator)))
}

/// Returns true if `path` exists (following symlinks).
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Returns true if `path` exists and is a directory.
pub fn is_dir(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

pub fn stat(path: impl AsRef<Path>) -> io::Result<Metadata> {
    fs::metadata(path)
}

/// Joins a logical `name` onto `base`.
///
/// Unlike [`Path::join`], a leading separator in `name` does not replace
/// the base: `join("/srv", "/a.txt")` is `/srv/a.txt`.
pub fn join(base: &Path, name: &str) -> PathBuf {
    let name = name.trim_start_matches(is_separator);
    if name.is_empty() {
        base.to_path_buf()
    } else {
        base.join(name)
    }
}

/// Strips trailing separators, keeping a bare root intact.
pub fn trim_separator(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

/// Returns true if `path` is `root` or lies beneath it.
///
/// The comparison is per component, so `/srv/www2` is not inside `/srv/www`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Derives the cache key of `path` relative to `root`.
///
/// Returns `None` if `path` is not inside `root`.
pub fn name_from_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    cache_key(&relative.to_string_lossy())
}

fn is_separator(c: char) -> bool {
    c == '/' || c == MAIN_SEPARATOR
}
