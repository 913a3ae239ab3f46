//! Insertion placement
//!
//! `Relation` is the caller-facing pairing of a target node with a side.
//! `InsertPosition` is the closed set of protocols the list mutator actually
//! runs; an absent relation maps to `InsertPosition::Tail`.

use crate::models::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the target node the new node is spliced on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    After,
    Before,
}

/// Target node id plus the side to insert on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: NodeId,
    pub position: Position,
}

impl Relation {
    pub fn after(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            position: Position::After,
        }
    }

    pub fn before(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            position: Position::Before,
        }
    }
}

/// Insertion protocol selector
///
/// # Examples
///
/// ```rust
/// use linked_collection::models::{InsertPosition, NodeId, Relation};
///
/// assert_eq!(InsertPosition::from(None), InsertPosition::Tail);
/// assert_eq!(
///     InsertPosition::from(Some(Relation::before("song-1"))),
///     InsertPosition::Before(NodeId::from("song-1")),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum InsertPosition {
    /// Append after the current tail (or start the list when empty)
    Tail,
    /// Splice directly after the target, inheriting its successor
    After(NodeId),
    /// Splice directly before the target, taking over its predecessor
    Before(NodeId),
}

impl InsertPosition {
    /// Target node id, if this protocol has one
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            InsertPosition::Tail => None,
            InsertPosition::After(id) | InsertPosition::Before(id) => Some(id),
        }
    }

    /// Short protocol name for logging
    pub fn protocol(&self) -> &'static str {
        match self {
            InsertPosition::Tail => "append",
            InsertPosition::After(_) => "insert-after",
            InsertPosition::Before(_) => "insert-before",
        }
    }
}

impl From<Relation> for InsertPosition {
    fn from(relation: Relation) -> Self {
        match relation.position {
            Position::After => InsertPosition::After(relation.id),
            Position::Before => InsertPosition::Before(relation.id),
        }
    }
}

impl From<Option<Relation>> for InsertPosition {
    fn from(relation: Option<Relation>) -> Self {
        relation.map_or(InsertPosition::Tail, Into::into)
    }
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertPosition::Tail => f.write_str("tail"),
            InsertPosition::After(id) => write!(f, "after '{}'", id),
            InsertPosition::Before(id) => write!(f, "before '{}'", id),
        }
    }
}
