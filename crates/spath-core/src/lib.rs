//! spath Core - path resolution and cache primitives
//!
//! This crate provides the building blocks shared by the search index:
//! thin wrappers over the OS path primitives, the normalized cache key
//! format and the in-memory cache store, plus the configuration file.
//!
//! # Example
//!
//! ```no_run
//! use spath_core::{cache_key, CacheEntry, CacheStore};
//! use std::path::PathBuf;
//!
//! let store = CacheStore::new();
//! let key = cache_key("templates/./index.html").unwrap();
//! store.set(key, CacheEntry::new(PathBuf::from("/srv/templates/index.html"), false));
//! assert!(store.get("/templates/index.html").is_some());
//! assert!(cache_key("../outside.txt").is_none());
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod path;

pub use cache::{cache_key, CacheEntry, CacheStore};
pub use config::SpathConfig;
pub use error::{Result, SpathError};
