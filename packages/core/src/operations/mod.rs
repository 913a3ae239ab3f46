//! List Operations
//!
//! This module provides the mutating side of the stored list:
//!
//! - `LinkedCollection` - tail-append, insert-after and insert-before
//! - `InsertQueue` - retry wrapper for insertions that lost a link race
//! - `ConsistencyChecker` - scan for broken links and discard stranded nodes
//! - `LinkedListError` - typed failures naming the phase that failed

pub mod consistency;
mod error;
pub mod insert_queue;
mod linked_collection;


pub use consistency::{ChainReport, ConsistencyChecker};
pub use error::LinkedListError;
pub use insert_queue::InsertQueue;
pub use linked_collection::LinkedCollection;
