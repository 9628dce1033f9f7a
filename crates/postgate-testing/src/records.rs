use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use postgate::RecordStore;

/// A write attempted against [`MemoryRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOp {
    Put { key: String },
    AppendIndex { index_key: String },
}

/// In-memory record store with operation tracing and failure injection.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    values: DashMap<String, serde_json::Value>,
    indexes: DashMap<String, Vec<serde_json::Value>>,
    operations: Mutex<Vec<RecordOp>>,
    fail_puts: AtomicBool,
    fail_appends: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_index_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Every write attempted so far, including failed ones.
    pub fn operations(&self) -> Vec<RecordOp> {
        self.operations.lock().unwrap().clone()
    }

    pub fn record_count(&self) -> usize {
        self.values.len()
    }

    fn trace(&self, op: RecordOp) {
        self.operations.lock().unwrap().push(op);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.trace(RecordOp::Put {
            key: key.to_string(),
        });
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("injected put failure: {key}");
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn append_index(&self, index_key: &str, value: serde_json::Value) -> Result<()> {
        self.trace(RecordOp::AppendIndex {
            index_key: index_key.to_string(),
        });
        if self.fail_appends.load(Ordering::SeqCst) {
            bail!("injected index failure: {index_key}");
        }
        self.indexes
            .entry(index_key.to_string())
            .or_default()
            .push(value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.values.get(key).map(|value| value.clone()))
    }

    async fn read_index(&self, index_key: &str) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .indexes
            .get(index_key)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }
}
