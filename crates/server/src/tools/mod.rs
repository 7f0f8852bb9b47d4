//! MCP tool implementations.
//!
//! `worker` carries the lifecycle and intercept signals; `cache` inspects
//! and prunes namespaces directly.

pub mod cache;
pub mod worker;
