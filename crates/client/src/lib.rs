//! Client code for poe-relay.
//!
//! This crate provides the source abstraction, the cache-first fallback
//! fetcher, a generic HTTP JSON source, and the character lookup built on them.

pub mod character;
pub mod fallback;
pub mod http;
pub mod source;

pub use character::{CharacterRecord, CharacterService, character_key, normalize_league};
pub use fallback::{AttemptOutcome, FallbackFetcher, FetchReport, Origin, SourceAttempt};
pub use http::{HttpConfig, HttpJsonSource, JsonClient, TemplateError, UrlTemplate};
pub use source::{Entity, FetchParams, Source, SourceDescriptor, SourceError};
