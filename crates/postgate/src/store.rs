//! Record store interface.
//!
//! Two write shapes only: a full replace of one record by key, and an append
//! to an index list. The workflow never reads before writing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{ActorId, ResourceId, SubmissionRecord};

/// Persistent store for submission records and per-actor daily indexes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace the value stored at `key`.
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Append `value` to the list stored at `index_key`.
    async fn append_index(&self, index_key: &str, value: serde_json::Value) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Entries of an index, in append order.
    async fn read_index(&self, index_key: &str) -> Result<Vec<serde_json::Value>>;
}

/// Key of the canonical record for a resource.
pub fn canonical_key(resource_id: &ResourceId) -> String {
    format!("submission:{resource_id}")
}

/// Key of an actor's index for one UTC day.
pub fn daily_index_key(actor: &ActorId, date: NaiveDate) -> String {
    format!("daily:{actor}:{}", date.format("%Y-%m-%d"))
}

/// Read and decode the canonical record for `resource_id`.
pub async fn load_record(
    store: &dyn RecordStore,
    resource_id: &ResourceId,
) -> Result<Option<SubmissionRecord>> {
    let key = canonical_key(resource_id);
    store
        .get(&key)
        .await?
        .map(|value| {
            serde_json::from_value(value).with_context(|| format!("malformed record at {key}"))
        })
        .transpose()
}

/// Read and decode an actor's daily index.
pub async fn load_daily_index(
    store: &dyn RecordStore,
    actor: &ActorId,
    date: NaiveDate,
) -> Result<Vec<SubmissionRecord>> {
    let key = daily_index_key(actor, date);
    store
        .read_index(&key)
        .await?
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).with_context(|| format!("malformed entry in {key}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidatePayload;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore {
        values: Mutex<HashMap<String, serde_json::Value>>,
        indexes: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    }

    #[async_trait]
    impl RecordStore for MapStore {
        async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn append_index(&self, index_key: &str, value: serde_json::Value) -> Result<()> {
            self.indexes
                .lock()
                .unwrap()
                .entry(index_key.to_string())
                .or_default()
                .push(value);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn read_index(&self, index_key: &str) -> Result<Vec<serde_json::Value>> {
            Ok(self
                .indexes
                .lock()
                .unwrap()
                .get(index_key)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[test]
    fn key_formats() {
        assert_eq!(canonical_key(&ResourceId::new("t3_x")), "submission:t3_x");
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            daily_index_key(&ActorId::new("u1"), date),
            "daily:u1:2024-01-05"
        );
    }

    #[tokio::test]
    async fn typed_reads_decode_stored_records() {
        let store = MapStore::default();
        let record = SubmissionRecord::new(
            CandidatePayload::new("cat", "animals", json!(null)),
            ActorId::new("u1"),
            ResourceId::new("t3_x"),
            Utc::now(),
            "drawing",
        );
        let value = serde_json::to_value(&record).unwrap();
        store.put(&record.canonical_key(), value.clone()).await.unwrap();
        store
            .append_index(&record.daily_index_key(), value)
            .await
            .unwrap();

        let loaded = load_record(&store, &record.resource_id).await.unwrap();
        assert_eq!(loaded, Some(record.clone()));

        let index = load_daily_index(&store, &record.author_id, record.created_on())
            .await
            .unwrap();
        assert_eq!(index, vec![record]);
    }

    #[tokio::test]
    async fn missing_record_is_none_and_malformed_is_error() {
        let store = MapStore::default();
        let id = ResourceId::new("t3_missing");
        assert!(load_record(&store, &id).await.unwrap().is_none());

        store
            .put(&canonical_key(&id), json!({"not": "a record"}))
            .await
            .unwrap();
        let err = load_record(&store, &id).await.unwrap_err();
        assert!(err.to_string().contains("malformed record"));
    }
}
