//! LinkedCollection - list mutator over a document store
//!
//! Splices new nodes into a singly-linked list whose nodes are records in a
//! `DocumentStore`. Three protocols exist, selected by `InsertPosition`:
//!
//! | Protocol | Reads | Writes |
//! |----------|-------|--------|
//! | `Tail` | current tail (`next` absent) | insert new tail, point old tail at it |
//! | `After(t)` | target | insert node inheriting `t.next`, point `t` at it |
//! | `Before(t)` | target, predecessor of `t` | insert node pointing at `t`, repoint predecessor (or move `head` off `t`) |
//!
//! # Concurrency
//!
//! Reads and writes are separate store calls, so two insertions racing on the
//! same neighborhood could both patch the same neighbor and drop a node from
//! the chain. Two mechanisms prevent that:
//!
//! 1. **Write gate**: every insertion holds a shared async mutex from its first
//!    read to its last write. Clones of a `LinkedCollection` share the gate.
//! 2. **Link guard**: the neighbor patch only applies if the neighbor's `next`
//!    (and `head`, when set) still hold the values read earlier. When the guard
//!    misses, the new node is deleted again and `LinkConflict` is returned;
//!    `InsertQueue` retries those. The first node of an empty list has no
//!    neighbor to guard, so after inserting it the list is checked for a
//!    second head instead.
//!
//! # Examples
//!
//! ```rust
//! use linked_collection::db::MemoryStore;
//! use linked_collection::models::Relation;
//! use linked_collection::operations::LinkedCollection;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let playlist = LinkedCollection::new(Arc::new(MemoryStore::new()));
//!
//! let first = playlist.insert(json!({ "name": "Sixteen Tons" }), None).await?;
//! let second = playlist
//!     .insert(json!({ "name": "Pickup Man" }), Some(Relation::before(first.clone())))
//!     .await?;
//!
//! let head = playlist.get(&second).await?.unwrap();
//! assert!(head.head);
//! assert_eq!(head.next, Some(first));
//! # Ok::<(), linked_collection::operations::LinkedListError>(())
//! # }).unwrap();
//! ```

use crate::config::LinkedCollectionConfig;
use crate::db::{Document, DocumentStore, Filter, Update};
use crate::models::{
    new_record, InsertPosition, LinkedNode, NodeId, Relation, HEAD_FIELD, NEXT_FIELD,
    VERSION_FIELD,
};
use crate::operations::LinkedListError;
use anyhow::anyhow;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Link-only view of a neighbor; its payload is never needed
pub(crate) type Link = LinkedNode<IgnoredAny>;

/// Insertion entry point for one store-resident list
pub struct LinkedCollection<T> {
    store: Arc<dyn DocumentStore>,
    write_gate: Arc<Mutex<()>>,
    config: LinkedCollectionConfig,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for LinkedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            write_gate: Arc::clone(&self.write_gate),
            config: self.config.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> LinkedCollection<T> {
    /// Create a collection with default configuration
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, LinkedCollectionConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: LinkedCollectionConfig) -> Self {
        Self {
            store,
            write_gate: Arc::new(Mutex::new(())),
            config,
            _payload: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &LinkedCollectionConfig {
        &self.config
    }
}

impl<T> LinkedCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Insert `payload`; without a relation the node is appended at the tail
    ///
    /// # Returns
    ///
    /// The store-assigned id of the new node.
    ///
    /// # Errors
    ///
    /// - `RelationNotFound` if the relation's target doesn't exist (no write happened)
    /// - `StoreUnavailable` if a store call failed before the node was written
    /// - `InvariantViolation` if the stored list is already malformed
    /// - `PartialInsertFailure` if the node was written but not linked in
    /// - `InsertOutcomeUnknown` if the node insert timed out (it may be stored)
    /// - `LinkConflict` if a neighbor changed underneath (rolled back, retriable)
    pub async fn insert(
        &self,
        payload: T,
        relation: Option<Relation>,
    ) -> Result<NodeId, LinkedListError> {
        self.insert_at(&payload, relation.into()).await
    }

    /// Append after the current tail
    pub async fn append(&self, payload: &T) -> Result<NodeId, LinkedListError> {
        self.insert_at(payload, InsertPosition::Tail).await
    }

    /// Splice directly after `target`
    pub async fn insert_after(
        &self,
        payload: &T,
        target: &NodeId,
    ) -> Result<NodeId, LinkedListError> {
        self.insert_at(payload, InsertPosition::After(target.clone()))
            .await
    }

    /// Splice directly before `target`
    pub async fn insert_before(
        &self,
        payload: &T,
        target: &NodeId,
    ) -> Result<NodeId, LinkedListError> {
        self.insert_at(payload, InsertPosition::Before(target.clone()))
            .await
    }

    /// Insert `payload` at `position`
    ///
    /// The payload is converted to a record before anything is read, so shape
    /// errors never leave a trace in the store.
    pub async fn insert_at(
        &self,
        payload: &T,
        position: InsertPosition,
    ) -> Result<NodeId, LinkedListError> {
        let record = new_record(payload, false, None)?;

        let _gate = self.acquire_write_gate().await?;
        tracing::debug!("Running {} protocol ({})", position.protocol(), position);

        let id = match &position {
            InsertPosition::Tail => self.append_locked(record).await?,
            InsertPosition::After(target) => self.insert_after_locked(record, target).await?,
            InsertPosition::Before(target) => self.insert_before_locked(record, target).await?,
        };

        tracing::info!("Inserted node '{}' ({})", id, position);
        Ok(id)
    }

    /// Typed point lookup
    pub async fn get(&self, id: &NodeId) -> Result<Option<LinkedNode<T>>, LinkedListError> {
        let doc = self
            .call(self.store.find_one(&Filter::id(id)))
            .await
            .map_err(|e| LinkedListError::store_unavailable("node lookup", e))?;

        Ok(doc.map(LinkedNode::from_record).transpose()?)
    }

    async fn append_locked(&self, mut record: Document) -> Result<NodeId, LinkedListError> {
        let tail = self
            .find_unique(Filter::field_absent(NEXT_FIELD), "tail lookup")
            .await?;

        let Some(tail) = tail else {
            self.ensure_empty().await?;
            link(&mut record, true, None);
            let id = self.insert_record(record).await?;
            self.ensure_sole_head(&id).await?;
            tracing::debug!("List was empty; '{}' is now head and tail", id);
            return Ok(id);
        };

        tracing::debug!("Current tail is '{}'", tail.id);
        let id = self.insert_record(record).await?;
        self.relink(&id, &tail, Update::new().set(NEXT_FIELD, id.clone()))
            .await?;
        Ok(id)
    }

    async fn insert_after_locked(
        &self,
        mut record: Document,
        target: &NodeId,
    ) -> Result<NodeId, LinkedListError> {
        let target = self.find_target(target).await?;

        link(&mut record, false, target.next.as_ref());
        let id = self.insert_record(record).await?;
        self.relink(&id, &target, Update::new().set(NEXT_FIELD, id.clone()))
            .await?;
        Ok(id)
    }

    async fn insert_before_locked(
        &self,
        mut record: Document,
        target: &NodeId,
    ) -> Result<NodeId, LinkedListError> {
        let target = self.find_target(target).await?;

        if target.head {
            link(&mut record, true, Some(&target.id));
            let id = self.insert_record(record).await?;
            tracing::debug!("Moving head from '{}' to '{}'", target.id, id);
            self.relink(&id, &target, Update::new().unset(HEAD_FIELD))
                .await?;
            return Ok(id);
        }

        let predecessor = self
            .find_unique(
                Filter::field_eq(NEXT_FIELD, target.id.clone()),
                "predecessor lookup",
            )
            .await?
            .ok_or_else(|| {
                tracing::error!("Node '{}' is neither head nor anyone's successor", target.id);
                LinkedListError::invariant_violation(format!(
                    "node '{}' is not the head and has no predecessor",
                    target.id
                ))
            })?;

        tracing::debug!("Predecessor of '{}' is '{}'", target.id, predecessor.id);
        link(&mut record, false, Some(&target.id));
        let id = self.insert_record(record).await?;
        self.relink(&id, &predecessor, Update::new().set(NEXT_FIELD, id.clone()))
            .await?;
        Ok(id)
    }

    /// Look up the relation target; absence is a hard error, never a fallback
    async fn find_target(&self, target: &NodeId) -> Result<Link, LinkedListError> {
        let doc = self
            .call(self.store.find_one(&Filter::id(target)))
            .await
            .map_err(|e| LinkedListError::store_unavailable("target lookup", e))?
            .ok_or_else(|| LinkedListError::relation_not_found(target.clone()))?;

        Ok(Link::from_record(doc)?)
    }

    /// Query expecting at most one match; two matches mean a corrupted list
    async fn find_unique(
        &self,
        filter: Filter,
        operation: &'static str,
    ) -> Result<Option<Link>, LinkedListError> {
        let mut docs = self
            .call(self.store.find(&filter, Some(2)))
            .await
            .map_err(|e| LinkedListError::store_unavailable(operation, e))?;

        if docs.len() > 1 {
            tracing::error!("{} matched more than one record ({:?})", operation, filter);
            return Err(LinkedListError::invariant_violation(format!(
                "{} matched more than one record",
                operation
            )));
        }

        Ok(docs.pop().map(Link::from_record).transpose()?)
    }

    /// A list without a tail must be empty; otherwise the chain has a cycle
    async fn ensure_empty(&self) -> Result<(), LinkedListError> {
        let any = self
            .call(self.store.find(&Filter::All, Some(1)))
            .await
            .map_err(|e| LinkedListError::store_unavailable("emptiness check", e))?;

        if any.is_empty() {
            return Ok(());
        }

        // A writer outside the gate may have started the list in between
        if let Some(tail) = self
            .find_unique(Filter::field_absent(NEXT_FIELD), "tail lookup")
            .await?
        {
            tracing::warn!("List was started concurrently; '{}' is now the tail", tail.id);
            return Err(LinkedListError::link_conflict(tail.id));
        }

        tracing::error!("List has records but no tail");
        Err(LinkedListError::invariant_violation(
            "list is not empty but has no tail",
        ))
    }

    /// Check that a freshly started list did not race another first insertion
    ///
    /// The later of two racing first nodes always sees both heads here and is
    /// rolled back, so at most one survives.
    async fn ensure_sole_head(&self, inserted: &NodeId) -> Result<(), LinkedListError> {
        let heads = match self
            .call(self.store.find(&Filter::field_eq(HEAD_FIELD, true), Some(2)))
            .await
        {
            Ok(heads) => heads,
            Err(e) => {
                return Err(LinkedListError::partial_insert_failure(
                    inserted.clone(),
                    format!("head check failed: {:#}", e),
                ))
            }
        };

        if heads.len() < 2 {
            return Ok(());
        }

        tracing::warn!("Another writer started the list; rolling back '{}'", inserted);
        self.roll_back(inserted, LinkedListError::link_conflict(inserted.clone()))
            .await
    }

    /// Insert the new node
    ///
    /// A store error means nothing was written. A timeout does not: the store
    /// may have committed the record after the caller stopped waiting.
    async fn insert_record(&self, record: Document) -> Result<NodeId, LinkedListError> {
        let insert = self.store.insert_one(record);
        let result = match self.config.store_timeout {
            Some(limit) => match tokio::time::timeout(limit, insert).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Node insert timed out after {:?}; outcome unknown", limit);
                    return Err(LinkedListError::insert_outcome_unknown(limit));
                }
            },
            None => insert.await,
        };
        result.map_err(|e| LinkedListError::store_unavailable("node insert", e))
    }

    /// Patch `neighbor` so the list includes `inserted`
    ///
    /// The patch only applies while the neighbor's links still match what was
    /// read; on a miss the inserted node is deleted again.
    async fn relink(
        &self,
        inserted: &NodeId,
        neighbor: &Link,
        update: Update,
    ) -> Result<(), LinkedListError> {
        let filter = Filter::id(&neighbor.id).and(link_guard(neighbor));
        let update = update.set(VERSION_FIELD, neighbor.version.saturating_add(1));

        match self.call(self.store.update_one(&filter, &update)).await {
            Ok(result) if result.matched_one() => {
                tracing::debug!("Relinked '{}' to include '{}'", neighbor.id, inserted);
                Ok(())
            }
            Ok(_) => {
                tracing::warn!(
                    "Node '{}' changed since it was read; rolling back '{}'",
                    neighbor.id,
                    inserted
                );
                self.roll_back(inserted, LinkedListError::link_conflict(neighbor.id.clone()))
                    .await
            }
            Err(e) => {
                tracing::warn!(
                    "Relinking '{}' failed after '{}' was inserted: {:#}",
                    neighbor.id,
                    inserted,
                    e
                );
                Err(LinkedListError::partial_insert_failure(
                    inserted.clone(),
                    format!("relinking '{}' failed: {:#}", neighbor.id, e),
                ))
            }
        }
    }

    /// Delete a node that never became reachable, then report `cause`
    async fn roll_back(
        &self,
        inserted: &NodeId,
        cause: LinkedListError,
    ) -> Result<(), LinkedListError> {
        match self
            .call(self.store.delete_one(&Filter::id(inserted)))
            .await
        {
            Ok(true) => Err(cause),
            Ok(false) => Err(LinkedListError::partial_insert_failure(
                inserted.clone(),
                format!("rollback found nothing to delete after: {}", cause),
            )),
            Err(e) => {
                tracing::warn!("Rollback of '{}' failed: {:#}", inserted, e);
                Err(LinkedListError::partial_insert_failure(
                    inserted.clone(),
                    format!("rollback failed after {}: {:#}", cause, e),
                ))
            }
        }
    }
}

impl<T> LinkedCollection<T> {
    pub(crate) async fn acquire_write_gate(&self) -> Result<MutexGuard<'_, ()>, LinkedListError> {
        match self.config.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, self.write_gate.lock())
                .await
                .map_err(|_| LinkedListError::lock_timeout(limit)),
            None => Ok(self.write_gate.lock().await),
        }
    }

    /// Run one store call under the configured timeout
    pub(crate) async fn call<R>(
        &self,
        fut: impl Future<Output = anyhow::Result<R>>,
    ) -> anyhow::Result<R> {
        match self.config.store_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| anyhow!("store call timed out after {:?}", limit))?,
            None => fut.await,
        }
    }
}

/// Set the link fields on a record that has not been inserted yet
fn link(record: &mut Document, head: bool, next: Option<&NodeId>) {
    if head {
        record.insert(HEAD_FIELD.to_string(), Value::Bool(true));
    }
    if let Some(next) = next {
        record.insert(NEXT_FIELD.to_string(), next.clone().into());
    }
}

/// Filter that only matches while `node`'s links are as they were read
pub(crate) fn link_guard(node: &Link) -> Filter {
    let next = match &node.next {
        Some(next) => Filter::field_eq(NEXT_FIELD, next.clone()),
        None => Filter::field_absent(NEXT_FIELD),
    };
    if node.head {
        next.and(Filter::field_eq(HEAD_FIELD, true))
    } else {
        next
    }
}
