//! Data Models
//!
//! This module contains the typed view of the stored list:
//!
//! - `LinkedNode<T>` - One list element and its record adapter
//! - `NodeId` - Store-assigned node identifier
//! - `Relation` / `InsertPosition` - Where a new node is spliced

mod node;
mod relation;


pub use node::{
    LinkedNode, NodeId, ValidationError, HEAD_FIELD, ID_FIELD, INITIAL_VERSION, NEXT_FIELD,
    RESERVED_FIELDS, VERSION_FIELD,
};
pub(crate) use node::new_record;
pub use relation::{InsertPosition, Position, Relation};
