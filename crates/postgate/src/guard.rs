//! Admission guard: single-flight submission lock per actor.
//!
//! Acquisition is one atomic set-if-absent with an expiry. There is no
//! release; the key lapses after the lockout window, so a crashed attempt
//! rate-limits the actor instead of locking them out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::model::ActorId;

/// Prefix of every admission lock key.
pub const LOCK_KEY_PREFIX: &str = "locked:";

/// Lock key for an actor.
pub fn lock_key(actor: &ActorId) -> String {
    format!("{LOCK_KEY_PREFIX}{actor}")
}

/// Key-value backend with an atomic conditional write.
#[async_trait]
pub trait GuardStore: Send + Sync {
    /// Store `value` at `key` for `ttl`, only if no live value exists.
    ///
    /// Returns `true` iff the write took effect. Implementations must do this
    /// in a single atomic operation, never as a read followed by a write.
    async fn set_if_absent(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<bool>;
}

/// Prevents duplicate submissions by the same actor within a lockout window.
#[derive(Clone)]
pub struct AdmissionGuard {
    store: Arc<dyn GuardStore>,
    lockout: Duration,
}

impl AdmissionGuard {
    pub fn new(store: Arc<dyn GuardStore>, lockout: Duration) -> Self {
        Self { store, lockout }
    }

    /// Try to take the actor's lock.
    ///
    /// `Ok(false)` means the lock is held. An `Err` means the backend failed
    /// and says nothing about whether a submission is in flight.
    pub async fn try_acquire(&self, actor: &ActorId) -> Result<bool> {
        self.store
            .set_if_absent(&lock_key(actor), serde_json::Value::Bool(true), self.lockout)
            .await
    }

    pub fn lockout_window(&self) -> Duration {
        self.lockout
    }
}

#[derive(Debug, Clone)]
struct GuardEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Writes between opportunistic sweeps of expired entries.
const PURGE_EVERY: u64 = 256;

/// Single-node guard store backed by a concurrent map.
///
/// The map's entry API holds the shard lock across the check and the
/// insert, which makes `set_if_absent` atomic per key. Every
/// `PURGE_EVERY`th write also sweeps expired entries, so the map stays
/// bounded by the actors active within one lockout window.
#[derive(Debug, Default)]
pub struct MemoryGuardStore {
    entries: DashMap<String, GuardEntry>,
    writes: AtomicU64,
}

impl MemoryGuardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value at `key`, if any.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    /// Drop expired entries. Returns how many were removed.
    ///
    /// Writes already call this periodically.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl GuardStore for MemoryGuardStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<bool> {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_EVERY == 0 {
            self.purge_expired();
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .with_context(|| format!("lock ttl {ttl:?} for {key} overflows the clock"))?;
        let fresh = GuardEntry { value, expires_at };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }
}
