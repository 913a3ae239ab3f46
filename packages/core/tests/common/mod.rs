//! Shared fixtures for the integration tests
//!
//! - `playlist()` - seven songs used across the scenarios
//! - `FaultyStore` - `MemoryStore` wrapper that fails chosen store calls
//! - `SlowAckStore` - `MemoryStore` wrapper that acknowledges inserts late
//! - `init_tracing()` - opt-in log output via `RUST_LOG`

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use linked_collection::db::{Document, DocumentStore, Filter, MemoryStore, Update, UpdateResult};
use linked_collection::models::NodeId;
use linked_collection::{ChainReport, ConsistencyChecker, LinkedCollection};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Music {
    pub name: String,
    pub artist: String,
}

fn music(name: &str, artist: &str) -> Music {
    Music {
        name: name.to_string(),
        artist: artist.to_string(),
    }
}

pub fn playlist() -> Vec<Music> {
    vec![
        music("The Devil Wears a Suit and Tie", "Colter Wall"),
        music("Pickup Man", "Joe Diffie"),
        music("Flowers On the Wall", "The Statler Brothers"),
        music("Take Me Home, Country Roads", "John Denver"),
        music("Sixteen Tons", "Tennessee Ernie Ford"),
        music("Hey, Good Lookin'", "Hank Williams"),
        music("Union Dixie", "Tennessee Ernie Ford"),
    ]
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Which store call a `FaultyStore` should break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Find,
    Insert,
    Update,
    Delete,
}

/// `MemoryStore` wrapper that errors on the n-th call of one kind
///
/// Calls are counted per kind starting at 1. `fail_from(Fault::Update, 1)`
/// makes every update fail; `fail_once(Fault::Find, 2)` breaks only the
/// second find.
pub struct FaultyStore {
    pub inner: MemoryStore,
    fault: Fault,
    first: usize,
    last: usize,
    finds: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl FaultyStore {
    /// Counts calls without failing any
    pub fn healthy(inner: MemoryStore) -> Self {
        Self::new(inner, Fault::Find, usize::MAX, 0)
    }

    pub fn fail_from(inner: MemoryStore, fault: Fault, nth: usize) -> Self {
        Self::new(inner, fault, nth, usize::MAX)
    }

    pub fn fail_once(inner: MemoryStore, fault: Fault, nth: usize) -> Self {
        Self::new(inner, fault, nth, nth)
    }

    fn new(inner: MemoryStore, fault: Fault, first: usize, last: usize) -> Self {
        Self {
            inner,
            fault,
            first,
            last,
            finds: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self, fault: Fault) -> usize {
        self.counter(fault).load(Ordering::SeqCst)
    }

    fn counter(&self, fault: Fault) -> &AtomicUsize {
        match fault {
            Fault::Find => &self.finds,
            Fault::Insert => &self.inserts,
            Fault::Update => &self.updates,
            Fault::Delete => &self.deletes,
        }
    }

    fn tick(&self, fault: Fault) -> Result<()> {
        let n = self.counter(fault).fetch_add(1, Ordering::SeqCst) + 1;
        if fault == self.fault && (self.first..=self.last).contains(&n) {
            anyhow::bail!("injected {:?} failure on call {}", fault, n);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        self.tick(Fault::Find)?;
        self.inner.find(filter, limit).await
    }

    async fn insert_one(&self, doc: Document) -> Result<NodeId> {
        self.tick(Fault::Insert)?;
        self.inner.insert_one(doc).await
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        self.tick(Fault::Update)?;
        self.inner.update_one(filter, update).await
    }

    async fn delete_one(&self, filter: &Filter) -> Result<bool> {
        self.tick(Fault::Delete)?;
        self.inner.delete_one(filter).await
    }
}

/// `MemoryStore` whose inserts commit immediately but acknowledge late
pub struct SlowAckStore {
    pub inner: MemoryStore,
    ack_delay: Duration,
}

impl SlowAckStore {
    pub fn new(inner: MemoryStore, ack_delay: Duration) -> Self {
        Self { inner, ack_delay }
    }
}

#[async_trait]
impl DocumentStore for SlowAckStore {
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        self.inner.find(filter, limit).await
    }

    async fn insert_one(&self, doc: Document) -> Result<NodeId> {
        let id = self.inner.insert_one(doc).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(id)
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        self.inner.update_one(filter, update).await
    }

    async fn delete_one(&self, filter: &Filter) -> Result<bool> {
        self.inner.delete_one(filter).await
    }
}

/// Build a collection over a fresh `MemoryStore`, returning both
pub fn memory_collection<T>() -> (LinkedCollection<T>, MemoryStore) {
    let store = MemoryStore::new();
    (LinkedCollection::new(Arc::new(store.clone())), store)
}

/// Scan `collection` and assert the list invariants hold for `expected` nodes
pub async fn assert_well_formed<T>(collection: &LinkedCollection<T>, expected: usize) -> ChainReport {
    let report = ConsistencyChecker::new(collection.clone())
        .check()
        .await
        .expect("consistency scan failed");

    assert!(report.is_consistent(), "inconsistent list: {:?}", report);
    assert_eq!(report.node_count, expected);
    assert_eq!(report.chain.len(), expected);
    report
}
