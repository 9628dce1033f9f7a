use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use postgate::{GuardStore, MemoryGuardStore};

/// [`MemoryGuardStore`] wrapper that counts calls and can simulate an outage.
#[derive(Debug, Default)]
pub struct FlakyGuardStore {
    inner: MemoryGuardStore,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl FlakyGuardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Live value at `key`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key)
    }
}

#[async_trait]
impl GuardStore for FlakyGuardStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("guard store unreachable");
        }
        self.inner.set_if_absent(key, value, ttl).await
    }
}
