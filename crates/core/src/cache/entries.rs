//! Durable tier entry operations.
//!
//! Rows in the `cache` table hold opaque value bytes with an explicit expiry
//! column. Timestamps are stored as Unix epoch milliseconds.

use super::connection::CacheDb;
use crate::Error;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached value as stored in the durable tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Bytes,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Visible to readers iff `now < expires_at`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl CacheDb {
    /// Insert or replace an entry.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache (key, value, expires_at, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at,
                        created_at = excluded.created_at",
                    params![
                        &entry.key,
                        &entry.value[..],
                        entry.expires_at.timestamp_millis(),
                        entry.created_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key, fresh or not.
    ///
    /// Returns None if the key doesn't exist.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare("SELECT key, value, expires_at, created_at FROM cache WHERE key = ?1")?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        value: Bytes::from(row.get::<_, Vec<u8>>(1)?),
                        expires_at: from_millis(row.get(2)?),
                        created_at: from_millis(row.get(3)?),
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry. Returns whether a row was removed.
    pub async fn delete_entry(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete `key` only if its row has expired as of `now`.
    ///
    /// A row rewritten since it was read as expired is left alone.
    pub async fn delete_expired_entry(&self, key: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let key = key.to_string();
        let now = now.timestamp_millis();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache WHERE key = ?1 AND expires_at <= ?2", params![key, now])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries with `expires_at < now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let now = now.timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache WHERE expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
