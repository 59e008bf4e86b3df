//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and pruning the tiered cache.

pub mod purge;
pub mod stats;

pub use purge::{CacheDeleteParams, clear_impl, cleanup_impl, delete_impl};
pub use stats::stats_impl;
