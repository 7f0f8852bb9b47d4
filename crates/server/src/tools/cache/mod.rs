//! Cache namespace tools.

pub mod delete;
pub mod list;

pub use delete::{CacheDeleteParams, delete_impl};
pub use list::list_impl;
