//! In-process `DocumentStore`
//!
//! Keeps records in a mutex-guarded map keyed by a generated UUID. Useful for
//! tests, benchmarks and embedders that don't need durability. Optional
//! simulated latency makes every call yield, which widens race windows in
//! concurrency tests the way a network round-trip would.

use crate::db::{Document, DocumentStore, Filter, Update, UpdateResult};
use crate::models::{NodeId, ID_FIELD};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Store backed by process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, Document>>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that sleeps for `latency` before serving every call
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            records: Arc::default(),
            latency: Some(latency),
        }
    }

    /// Store pre-populated with records; each must carry a string `_id`
    pub fn with_records(records: Vec<Document>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for record in records {
            let id = record
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Seed record is missing a string '{}'", ID_FIELD))?
                .to_string();
            map.insert(id, record);
        }

        Ok(Self {
            records: Arc::new(Mutex::new(map)),
            latency: None,
        })
    }

    /// Copy of every stored record
    pub fn snapshot(&self) -> Result<Vec<Document>> {
        let records = self.lock()?;
        Ok(records.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Document>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("Failed to acquire memory store lock"))
    }

    async fn simulate_network_delay(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        self.simulate_network_delay().await;

        let records = self.lock()?;
        let matches = records.values().filter(|doc| filter.matches(doc)).cloned();

        Ok(match limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }

    async fn insert_one(&self, mut doc: Document) -> Result<NodeId> {
        self.simulate_network_delay().await;

        let id = Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let mut records = self.lock()?;
        records.insert(id.clone(), doc);
        Ok(NodeId::from(id))
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        self.simulate_network_delay().await;

        let mut records = self.lock()?;
        let Some(doc) = records.values_mut().find(|doc| filter.matches(doc)) else {
            return Ok(UpdateResult::default());
        };

        let before = doc.clone();
        update.apply(doc);

        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(*doc != before),
        })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<bool> {
        self.simulate_network_delay().await;

        let mut records = self.lock()?;
        let key = records
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(key, _)| key.clone());

        Ok(match key {
            Some(key) => records.remove(&key).is_some(),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_ids() {
        let store = MemoryStore::new();
        let a = store.insert_one(doc(json!({ "n": 1 }))).await.unwrap();
        let b = store.insert_one(doc(json!({ "n": 2 }))).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len().unwrap(), 2);

        let found = store.find_one(&Filter::id(&a)).await.unwrap().unwrap();
        assert_eq!(found["n"], json!(1));
        assert_eq!(found["_id"], json!(a.as_str()));
    }

    #[tokio::test]
    async fn test_insert_overrides_caller_id() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(doc(json!({ "_id": "forged", "n": 1 })))
            .await
            .unwrap();

        assert_ne!(id.as_str(), "forged");
        assert!(store
            .find_one(&Filter::id(&NodeId::from("forged")))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_respects_limit() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store.insert_one(doc(json!({ "n": n }))).await.unwrap();
        }

        assert_eq!(store.find(&Filter::All, None).await.unwrap().len(), 5);
        assert_eq!(store.find(&Filter::All, Some(2)).await.unwrap().len(), 2);
        assert_eq!(
            store
                .find(&Filter::field_absent("next"), Some(10))
                .await
                .unwrap()
                .len(),
            5
        );
    }

    #[tokio::test]
    async fn test_update_reports_match_and_modification() {
        let store = MemoryStore::new();
        let id = store.insert_one(doc(json!({ "n": 1 }))).await.unwrap();

        let result = store
            .update_one(&Filter::id(&id), &Update::new().set("n", 2))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 1, modified: 1 });

        let result = store
            .update_one(&Filter::id(&id), &Update::new().set("n", 2))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 1, modified: 0 });

        let result = store
            .update_one(
                &Filter::id(&id).and(Filter::field_eq("n", 99)),
                &Update::new().set("n", 3),
            )
            .await
            .unwrap();
        assert!(!result.matched_one());
    }

    #[tokio::test]
    async fn test_update_can_clear_field() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(doc(json!({ "head": true })))
            .await
            .unwrap();

        store
            .update_one(&Filter::id(&id), &Update::new().unset("head"))
            .await
            .unwrap();

        let found = store.find_one(&Filter::id(&id)).await.unwrap().unwrap();
        assert!(!found.contains_key("head"));
    }

    #[tokio::test]
    async fn test_delete_one() {
        let store = MemoryStore::new();
        let id = store.insert_one(doc(json!({}))).await.unwrap();

        assert!(store.delete_one(&Filter::id(&id)).await.unwrap());
        assert!(!store.delete_one(&Filter::id(&id)).await.unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_with_records_requires_ids() {
        assert!(MemoryStore::with_records(vec![doc(json!({ "n": 1 }))]).is_err());

        let store = MemoryStore::with_records(vec![doc(json!({ "_id": "x" }))]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_latency_store_still_serves_calls() {
        let store = MemoryStore::with_latency(Duration::from_millis(1));
        let id = tokio_test::block_on(store.insert_one(doc(json!({ "n": 1 })))).unwrap();
        let found = tokio_test::block_on(store.find_one(&Filter::id(&id))).unwrap();
        assert!(found.is_some());
    }
}
