//! Store Query Vocabulary
//!
//! Predicates and partial updates understood by every `DocumentStore` backend.
//! The set is intentionally small: the list mutator only needs point lookups by
//! id, "field is absent" lookups (the tail) and "field equals value" lookups
//! (the predecessor), plus set/clear field assignments.
//!
//! `Filter::matches` and `Update::apply` are the reference semantics; backends
//! that translate filters into a native query language must agree with them.

use crate::models::{NodeId, ID_FIELD};
use serde_json::{Map, Value};

/// Raw stored record
pub type Document = Map<String, Value>;

/// Record predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record
    All,
    /// `_id` equals the given id
    IdEq(NodeId),
    /// Field is present and equal to the value
    FieldEq(String, Value),
    /// Field is absent (a JSON `null` counts as absent)
    FieldAbsent(String),
    /// Every sub-filter matches
    And(Vec<Filter>),
}

impl Filter {
    pub fn id(id: &NodeId) -> Self {
        Filter::IdEq(id.clone())
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::FieldEq(field.into(), value.into())
    }

    pub fn field_absent(field: impl Into<String>) -> Self {
        Filter::FieldAbsent(field.into())
    }

    /// Conjunction with another filter
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            Filter::All => other,
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate the predicate against a record
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::IdEq(id) => doc.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()),
            Filter::FieldEq(field, value) => doc.get(field) == Some(value),
            Filter::FieldAbsent(field) => matches!(doc.get(field), None | Some(Value::Null)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Partial field update
///
/// Assignments in `set` overwrite (or add) fields; fields in `unset` are
/// removed from the record entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Document,
    pub unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Apply the assignments to a record in place
    pub fn apply(&self, doc: &mut Document) {
        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }
        for field in &self.unset {
            doc.remove(field);
        }
    }
}

/// Acknowledgement of an `update_one` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Records the filter selected (0 or 1)
    pub matched: u64,
    /// Records actually rewritten
    pub modified: u64,
}

impl UpdateResult {
    pub fn matched_one(&self) -> bool {
        self.matched > 0
    }
}
