//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Cache namespace storage with SQLite backend
//! - Request/response values
//! - The routing pattern registry
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod routes;

pub use cache::{CacheDb, CachedEntry, NamespaceInfo};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use exchange::{Request, Response};
pub use routes::{PatternRegistry, PatternSpec, RouteClass, RouteConfig, RouteRule, UrlPattern};
