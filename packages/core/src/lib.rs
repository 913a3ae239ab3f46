//! Linked Collection
//!
//! An ordered singly-linked list whose nodes are records in an external
//! document store. Each record carries its own successor reference (`next`)
//! and an optional `head` marker; order is recovered by following `next`
//! from the head, never from a positional index.
//!
//! # Architecture
//!
//! - **Store-resident**: No list shape is cached in process; every insertion
//!   re-reads the neighbors it patches
//! - **Injected store**: The `DocumentStore` is passed in at construction
//! - **Serialized mutation**: A shared write gate plus guarded neighbor patches
//!   keep concurrent insertions from losing nodes
//!
//! # Modules
//!
//! - [`models`] - `LinkedNode`, `NodeId`, `Relation` and the record adapter
//! - [`db`] - `DocumentStore` trait, query vocabulary and backends
//! - [`operations`] - `LinkedCollection`, `InsertQueue`, `ConsistencyChecker`
//! - [`config`] - `LinkedCollectionConfig`

pub mod config;
pub mod db;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use config::LinkedCollectionConfig;
pub use db::{DocumentStore, MemoryStore};
pub use models::{InsertPosition, LinkedNode, NodeId, Position, Relation};
pub use operations::{ChainReport, ConsistencyChecker, InsertQueue, LinkedCollection, LinkedListError};
