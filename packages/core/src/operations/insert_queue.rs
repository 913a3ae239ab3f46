//! Insert queue with retry logic for optimistic concurrency control
//!
//! Wraps `LinkedCollection` and retries insertions that lost a link race
//! (`LinkConflict`) with exponential backoff. A conflicting insertion has
//! already been rolled back, so a retry starts from a clean neighborhood read.
//!
//! Only `LinkConflict` is retried. Store outages, missing relation targets and
//! corruption are returned to the caller unchanged.
//!
//! # Example
//!
//! ```rust
//! use linked_collection::db::MemoryStore;
//! use linked_collection::models::InsertPosition;
//! use linked_collection::operations::{InsertQueue, LinkedCollection};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let playlist = LinkedCollection::new(Arc::new(MemoryStore::new()));
//! let queue = InsertQueue::new(playlist);
//!
//! // Retries up to config.max_retries times (10ms, 20ms, 40ms by default)
//! let id = queue
//!     .insert_with_retry(&json!({ "name": "Take Me Home, Country Roads" }), InsertPosition::Tail)
//!     .await?;
//! # Ok::<(), linked_collection::operations::LinkedListError>(())
//! # }).unwrap();
//! ```

use crate::models::{InsertPosition, NodeId};
use crate::operations::{LinkedCollection, LinkedListError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Retrying front for a `LinkedCollection`
pub struct InsertQueue<T> {
    collection: LinkedCollection<T>,
}

impl<T> Clone for InsertQueue<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<T> InsertQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(collection: LinkedCollection<T>) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &LinkedCollection<T> {
        &self.collection
    }

    /// Insert with the configured retry budget
    pub async fn insert_with_retry(
        &self,
        payload: &T,
        position: InsertPosition,
    ) -> Result<NodeId, LinkedListError> {
        let max_retries = self.collection.config().max_retries;
        self.insert_with_max_retries(payload, position, max_retries)
            .await
    }

    /// Insert, retrying up to `max_retries` times on `LinkConflict`
    ///
    /// # Retry Behavior
    ///
    /// - **Retry on**: `LinkedListError::LinkConflict` only
    /// - **Backoff**: `retry_base_delay` × 2^attempt
    /// - **Other errors**: Fail immediately without retry
    pub async fn insert_with_max_retries(
        &self,
        payload: &T,
        position: InsertPosition,
        max_retries: usize,
    ) -> Result<NodeId, LinkedListError> {
        let mut attempt = 0;

        loop {
            match self.collection.insert_at(payload, position.clone()).await {
                Ok(id) => {
                    if attempt > 0 {
                        tracing::debug!(
                            "Insert ({}) succeeded after {} retry(ies)",
                            position,
                            attempt
                        );
                    }
                    return Ok(id);
                }

                Err(LinkedListError::LinkConflict { ref node_id }) if attempt < max_retries => {
                    let backoff = self.collection.config().backoff_for(attempt);
                    tracing::debug!(
                        "Link conflict on '{}' (attempt {}/{}), retrying in {:?}",
                        node_id,
                        attempt + 1,
                        max_retries + 1,
                        backoff
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }

                Err(e) => {
                    if matches!(e, LinkedListError::LinkConflict { .. }) {
                        tracing::warn!(
                            "Max retries ({}) exceeded for insert ({})",
                            max_retries,
                            position
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
