//! Linked Node Data Structures
//!
//! This module defines `LinkedNode<T>`, the typed view of one stored record
//! participating in the list, and the adapter that converts between that view
//! and the raw document the store persists.
//!
//! # Record Layout
//!
//! The caller's payload is flattened into the record beside the reserved link
//! fields:
//!
//! ```json
//! {
//!   "_id": "6f1c0e0a-...",
//!   "head": true,
//!   "next": "a3b9...",
//!   "version": 2,
//!   "name": "Sixteen Tons",
//!   "artist": "Tennessee Ernie Ford"
//! }
//! ```
//!
//! - `head` is written only when true; an absent field reads as `false`
//! - `next` is written only when the node has a successor; absent means tail
//! - `version` is bumped every time the node is relinked
//!
//! # Examples
//!
//! ```rust
//! use linked_collection::models::{LinkedNode, NodeId};
//! use serde_json::json;
//!
//! let record = json!({ "_id": "song-1", "head": true, "name": "Pickup Man" });
//! let node: LinkedNode<serde_json::Value> =
//!     LinkedNode::from_record(record.as_object().unwrap().clone()).unwrap();
//!
//! assert!(node.head);
//! assert!(node.is_tail());
//! assert_eq!(node.id, NodeId::from("song-1"));
//! ```

use crate::db::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Record field holding the store-assigned identifier
pub const ID_FIELD: &str = "_id";

/// Record field tagging the logical start of the list
pub const HEAD_FIELD: &str = "head";

/// Record field referencing the successor node
pub const NEXT_FIELD: &str = "next";

/// Record field counting how often the node was relinked
pub const VERSION_FIELD: &str = "version";

/// Field names the payload may not use
pub const RESERVED_FIELDS: [&str; 4] = [ID_FIELD, HEAD_FIELD, NEXT_FIELD, VERSION_FIELD];

/// Version assigned to a record that carries no `version` field
pub const INITIAL_VERSION: i64 = 1;

/// Shape errors raised while converting between records and nodes
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Payload uses reserved field name: {0}")]
    ReservedField(String),

    #[error("Payload must serialize to a JSON object, got {0}")]
    PayloadNotObject(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ValidationError {
    fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Store-assigned identifier of a node
///
/// Opaque to this crate: only compared for equality and written into `next`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::String(id.0)
    }
}

/// One list element as seen by the list mutator
///
/// # Fields
///
/// - `id`: Store-assigned identifier, immutable once created
/// - `payload`: Caller data, never rewritten after insertion
/// - `head`: True on exactly one node of a non-empty list
/// - `next`: Successor reference; `None` marks the tail
/// - `version`: Bumped whenever a later insertion patches this node's links
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedNode<T> {
    pub id: NodeId,
    pub payload: T,
    pub head: bool,
    pub next: Option<NodeId>,
    pub version: i64,
}

impl<T> LinkedNode<T> {
    /// True when this node has no successor
    pub fn is_tail(&self) -> bool {
        self.next.is_none()
    }
}

impl<T: DeserializeOwned> LinkedNode<T> {
    /// Interpret a raw stored record as a typed node
    ///
    /// Absent `head`, `next` and `version` fields map to `false`, `None` and
    /// [`INITIAL_VERSION`]. A JSON `null` is treated the same as absence.
    ///
    /// # Errors
    ///
    /// - `MissingField` if `_id` is absent
    /// - `InvalidField` if a link field has the wrong JSON type
    /// - `Serialization` if the remaining fields don't deserialize into `T`
    pub fn from_record(mut record: Document) -> Result<Self, ValidationError> {
        let id = match record.remove(ID_FIELD) {
            Some(Value::String(id)) => NodeId(id),
            Some(Value::Null) | None => {
                return Err(ValidationError::MissingField(ID_FIELD.to_string()))
            }
            Some(other) => {
                return Err(ValidationError::invalid_field(
                    ID_FIELD,
                    format!("expected string, got {}", other),
                ))
            }
        };

        let head = match record.remove(HEAD_FIELD) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(ValidationError::invalid_field(
                    HEAD_FIELD,
                    format!("expected boolean, got {}", other),
                ))
            }
        };

        let next = match record.remove(NEXT_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(next)) => Some(NodeId(next)),
            Some(other) => {
                return Err(ValidationError::invalid_field(
                    NEXT_FIELD,
                    format!("expected string, got {}", other),
                ))
            }
        };

        let version = match record.remove(VERSION_FIELD) {
            None | Some(Value::Null) => INITIAL_VERSION,
            Some(value) => value.as_i64().ok_or_else(|| {
                ValidationError::invalid_field(
                    VERSION_FIELD,
                    format!("expected integer, got {}", value),
                )
            })?,
        };

        let payload = serde_json::from_value(Value::Object(record))?;

        Ok(Self {
            id,
            payload,
            head,
            next,
            version,
        })
    }
}

impl<T: Serialize> LinkedNode<T> {
    /// Inverse of [`LinkedNode::from_record`]
    pub fn to_record(&self) -> Result<Document, ValidationError> {
        let mut record = payload_to_record(&self.payload)?;
        record.insert(ID_FIELD.to_string(), Value::String(self.id.0.clone()));
        apply_links(&mut record, self.head, self.next.as_ref(), self.version);
        Ok(record)
    }
}

/// Build the record for a node the store has not assigned an id to yet
pub(crate) fn new_record<T: Serialize>(
    payload: &T,
    head: bool,
    next: Option<&NodeId>,
) -> Result<Document, ValidationError> {
    let mut record = payload_to_record(payload)?;
    apply_links(&mut record, head, next, INITIAL_VERSION);
    Ok(record)
}

fn payload_to_record<T: Serialize>(payload: &T) -> Result<Document, ValidationError> {
    match serde_json::to_value(payload)? {
        Value::Object(fields) => {
            if let Some(reserved) = RESERVED_FIELDS.iter().find(|f| fields.contains_key(**f)) {
                return Err(ValidationError::ReservedField(reserved.to_string()));
            }
            Ok(fields)
        }
        other => Err(ValidationError::PayloadNotObject(json_kind(&other).to_string())),
    }
}

fn apply_links(record: &mut Document, head: bool, next: Option<&NodeId>, version: i64) {
    if head {
        record.insert(HEAD_FIELD.to_string(), Value::Bool(true));
    }
    if let Some(next) = next {
        record.insert(NEXT_FIELD.to_string(), Value::String(next.0.clone()));
    }
    record.insert(VERSION_FIELD.to_string(), Value::from(version));
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
