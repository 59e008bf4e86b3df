//! In-process cache tier.
//!
//! A bounded map with per-entry expiry. Eviction at capacity drops expired
//! entries first, then the oldest tenth by insertion order. Recency of reads
//! is not tracked: this tier is a hint layer in front of the durable tier.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};

#[derive(Debug)]
struct Slot {
    value: Bytes,
    expires_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    /// Insertion sequence -> key, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.expires_at < now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((_, key)) = self.order.pop_first() else { break };
            self.slots.remove(&key);
            evicted += 1;
        }
        evicted
    }
}

/// Bounded in-process tier.
#[derive(Debug)]
pub struct MemoryTier {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MemoryTier {
    /// Create a tier holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::new(Inner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a key, dropping it if it has expired.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Bytes> {
        let mut inner = self.lock();
        let expired = match inner.slots.get(key) {
            Some(slot) if now < slot.expires_at => return Some(slot.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.remove(key);
        }
        None
    }

    /// Insert or overwrite a key. Overwriting moves the key to the newest position.
    pub fn insert(&self, key: &str, value: Bytes, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        let mut inner = self.lock();

        if inner.remove(key).is_none() && inner.slots.len() >= self.capacity {
            let purged = inner.purge_expired(now);
            if inner.slots.len() >= self.capacity {
                let evicted = inner.evict_oldest((self.capacity / 10).max(1));
                tracing::debug!(purged, evicted, capacity = self.capacity, "Memory tier at capacity");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.to_string());
        inner.slots.insert(key.to_string(), Slot { value, expires_at, seq });
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    /// Remove entries with `expires_at < now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.lock().purge_expired(now)
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
