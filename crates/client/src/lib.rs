//! Request-interception engine for shellcache.
//!
//! This crate provides the network seam, the caching strategies and the
//! lifecycle controller that drives them. Storage, routing and configuration
//! types come from `shellcache-core`.

pub mod fetch;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, Fetcher, UrlError, canonicalize, resolve};
pub use strategy::{BackgroundWrites, Served, Source, Strategy, StrategyContext};
pub use worker::{Activation, Interception, OfflineWorker, WorkerConfig, WorkerState};
