//! Error types for linked list insertion
//!
//! Every variant tells the caller which phase of an insertion failed, which is
//! what decides between retrying the whole call and running a consistency
//! check first.

use crate::models::{NodeId, ValidationError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while inserting into a linked collection
///
/// # Examples
///
/// ```rust
/// use linked_collection::operations::LinkedListError;
///
/// let err = LinkedListError::relation_not_found("missing-song".into());
/// assert_eq!(format!("{}", err), "Relation target 'missing-song' does not exist");
/// assert!(!err.needs_repair());
/// ```
#[derive(Error, Debug)]
pub enum LinkedListError {
    /// The relation's target id matches no stored node
    ///
    /// Raised before any write; the store is untouched.
    #[error("Relation target '{node_id}' does not exist")]
    RelationNotFound { node_id: NodeId },

    /// A store call failed before the new node was written, or a lookup
    /// timed out
    ///
    /// The store is untouched; the caller may retry the whole insertion. A
    /// timed-out node insert is `InsertOutcomeUnknown` instead.
    #[error("Store unavailable during {operation}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The stored list is already malformed
    ///
    /// A tail or predecessor query matched more than one record, or a
    /// non-empty list has no tail / a non-head target has no predecessor.
    #[error("Linked list invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// The new node is stored but its neighbor was not repointed
    ///
    /// The list now holds a node unreachable from the head (or a second head)
    /// and needs repair, see `ConsistencyChecker`.
    #[error("Node '{inserted_id}' was inserted but the list was not relinked: {reason}")]
    PartialInsertFailure { inserted_id: NodeId, reason: String },

    /// The node insert timed out; the store may still have committed it
    ///
    /// If it did, the node is unreachable from the head. Run
    /// `ConsistencyChecker::check` before retrying.
    #[error("Node insert timed out after {waited:?}; the node may be stored but unlinked")]
    InsertOutcomeUnknown { waited: Duration },

    /// A neighbor's links changed between read and write (optimistic concurrency)
    ///
    /// The inserted node was rolled back; retrying re-reads the neighborhood.
    #[error("Node '{node_id}' was relinked concurrently")]
    LinkConflict { node_id: NodeId },

    /// The write gate could not be acquired in time
    ///
    /// Raised before any store call.
    #[error("Timed out after {waited:?} waiting for the list write lock")]
    LockTimeout { waited: Duration },

    /// A record could not be converted to or from a typed node
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LinkedListError {
    /// Create a RelationNotFound error
    pub fn relation_not_found(node_id: NodeId) -> Self {
        Self::RelationNotFound { node_id }
    }

    /// Create a StoreUnavailable error
    pub fn store_unavailable(operation: &'static str, source: anyhow::Error) -> Self {
        Self::StoreUnavailable { operation, source }
    }

    /// Create an InvariantViolation error
    pub fn invariant_violation(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Create a PartialInsertFailure error
    pub fn partial_insert_failure(inserted_id: NodeId, reason: impl Into<String>) -> Self {
        Self::PartialInsertFailure {
            inserted_id,
            reason: reason.into(),
        }
    }

    /// Create an InsertOutcomeUnknown error
    pub fn insert_outcome_unknown(waited: Duration) -> Self {
        Self::InsertOutcomeUnknown { waited }
    }

    /// Create a LinkConflict error
    pub fn link_conflict(node_id: NodeId) -> Self {
        Self::LinkConflict { node_id }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(waited: Duration) -> Self {
        Self::LockTimeout { waited }
    }

    /// True when retrying the whole insertion is safe and may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::LinkConflict { .. } | Self::StoreUnavailable { .. } | Self::LockTimeout { .. }
        )
    }

    /// True when the stored list may be inconsistent after this error
    pub fn needs_repair(&self) -> bool {
        matches!(
            self,
            Self::PartialInsertFailure { .. }
                | Self::InvariantViolation { .. }
                | Self::InsertOutcomeUnknown { .. }
        )
    }
}
