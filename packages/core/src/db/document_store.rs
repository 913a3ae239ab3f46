//! DocumentStore Trait - Store Abstraction Layer
//!
//! This module defines the `DocumentStore` trait the list mutator talks to.
//! The store owns persistence, id generation and query evaluation; the list
//! mutator owns the link structure between records.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so both embedded and network
//!    backends fit behind the same trait
//! 2. **Opaque Records**: Backends see `Document`s only; typing happens in
//!    `LinkedNode::from_record`
//! 3. **Error Handling**: Uses `anyhow::Result`; the list mutator classifies
//!    failures by the phase they happen in, not by backend error type
//! 4. **No Transactions**: Multi-call atomicity is provided above the store
//!    (write gate + link guards in `LinkedCollection`)
//!
//! # Examples
//!
//! ```rust
//! use linked_collection::db::{DocumentStore, Filter, MemoryStore};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let id = store
//!     .insert_one(json!({ "name": "Sixteen Tons" }).as_object().unwrap().clone())
//!     .await?;
//!
//! let found = store.find_one(&Filter::id(&id)).await?;
//! assert!(found.is_some());
//! # Ok::<(), anyhow::Error>(())
//! # }).unwrap();
//! ```

use crate::db::{Document, Filter, Update, UpdateResult};
use crate::models::NodeId;
use anyhow::Result;
use async_trait::async_trait;

/// Persistence operations the linked list needs from a document store
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every
/// `LinkedCollection` clone and may be called from any task.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find records matching `filter`
    ///
    /// # Arguments
    ///
    /// * `filter` - Predicate to evaluate
    /// * `limit` - Max records to return (None = no limit)
    ///
    /// Order of results is unspecified.
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>>;

    /// Find a single record matching `filter`
    ///
    /// Returns an arbitrary match when several records match; callers that
    /// must detect ambiguity use `find` with a limit of 2.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(filter, Some(1)).await?.into_iter().next())
    }

    /// Insert a new record and return its store-assigned id
    ///
    /// Any `_id` field already present in `doc` is replaced.
    async fn insert_one(&self, doc: Document) -> Result<NodeId>;

    /// Apply `update` to at most one record matching `filter`
    ///
    /// A filter that matches nothing is not an error: the result reports
    /// `matched = 0` and the caller decides what that means.
    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult>;

    /// Delete at most one record matching `filter`
    ///
    /// Returns whether a record was removed.
    async fn delete_one(&self, filter: &Filter) -> Result<bool>;
}
