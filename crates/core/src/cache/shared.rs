//! Shared cache tier.
//!
//! The only tier visible to other processes. Any store that speaks the
//! `GET` / `SETEX` / `DEL` / `FLUSHDB` shape can back it; `RedisStore` is the
//! provided implementation.

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::Error;

/// A remote key-value store with native expiry.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error>;

    /// Store `value` under `key`, expiring after `ttl_secs`.
    async fn set_ex(&self, key: &str, ttl_secs: u64, value: Bytes) -> Result<(), Error>;

    async fn del(&self, key: &str) -> Result<(), Error>;

    /// Remove every key in the store's database.
    async fn flush(&self) -> Result<(), Error>;
}

/// Whole seconds for `SETEX`, rounded up and never below one.
pub fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Redis-backed shared tier.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    ///
    /// The connection manager reconnects on its own after the initial connect.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Shared cache tier connected");
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: Bytes) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value.to_vec(), ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }
}
