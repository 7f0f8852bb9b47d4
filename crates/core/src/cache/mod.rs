//! SQLite-backed cache namespaces.
//!
//! This module provides the persistent store behind every cache namespace,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named namespaces created lazily and deleted wholesale
//! - Entries keyed by a SHA-256 digest of method and URL
//! - Last-write-wins upserts, atomic per key
//! - Generational cleanup of stale namespaces

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use namespaces::NamespaceInfo;
