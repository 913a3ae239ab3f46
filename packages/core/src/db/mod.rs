//! Database Layer
//!
//! This module holds the store collaborator boundary:
//!
//! - `DocumentStore` trait - find / insert / update / delete over opaque records
//! - `Filter` / `Update` - the predicate and partial-update vocabulary
//! - `MemoryStore` - in-process backend
//! - `SurrealStore` - embedded SurrealDB backend (`surrealdb` feature)
//!
//! The list mutator never assumes more from a backend than this trait offers;
//! in particular no multi-statement transactions.

mod document_store;
mod memory_store;
mod query;
#[cfg(feature = "surrealdb")]
mod surreal_store;

pub use document_store::DocumentStore;
pub use memory_store::MemoryStore;
pub use query::{Document, Filter, Update, UpdateResult};
#[cfg(feature = "surrealdb")]
pub use surreal_store::SurrealStore;
