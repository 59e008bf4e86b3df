//! Core types and shared functionality for poe-relay.
//!
//! This crate provides:
//! - Tiered cache (in-process map, optional Redis, SQLite)
//! - Token-bucket rate limiting per upstream endpoint
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod limiter;

pub use cache::{CacheDb, CacheEntry, CacheStats, CleanupReport, SharedStore, TierOptions, TieredCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, JsonCodec};
pub use config::{AppConfig, ConfigError, SourceConfig};
pub use error::Error;
pub use limiter::{EndpointLimiterRegistry, LimiterDefaults, LimiterStats, TokenBucketLimiter};
