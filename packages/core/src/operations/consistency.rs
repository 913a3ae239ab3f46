//! Consistency checking and repair for a stored list
//!
//! An insertion that fails with `PartialInsertFailure` (or, when the store
//! committed despite the timeout, `InsertOutcomeUnknown`) leaves a node in the
//! store that is not reachable from the head (or, when a new head was being
//! installed, a second head). `ConsistencyChecker` finds such damage and can
//! discard the stranded node.
//!
//! The checker scans the whole collection, so it is meant for recovery and
//! diagnostics, not for regular reads.

use crate::db::Filter;
use crate::models::{NodeId, HEAD_FIELD, NEXT_FIELD};
use crate::operations::linked_collection::{link_guard, Link};
use crate::operations::{LinkedCollection, LinkedListError};
use std::collections::{HashMap, HashSet};

/// Structural health of the stored list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    /// Records in the collection
    pub node_count: usize,
    /// Nodes carrying `head = true`
    pub heads: Vec<NodeId>,
    /// Nodes without a successor
    pub tails: Vec<NodeId>,
    /// Nodes that are the successor of more than one node
    pub shared_successors: Vec<NodeId>,
    /// `(node, missing successor)` pairs
    pub dangling: Vec<(NodeId, NodeId)>,
    /// Nodes not visited when walking from the head
    pub unreachable: Vec<NodeId>,
    /// Walking from the head revisited a node
    pub has_cycle: bool,
    /// Ids in walk order from the head (empty unless there is exactly one head)
    pub chain: Vec<NodeId>,
}

impl ChainReport {
    /// True when the stored list satisfies every list invariant
    pub fn is_consistent(&self) -> bool {
        if self.node_count == 0 {
            return self.heads.is_empty() && self.tails.is_empty();
        }
        self.heads.len() == 1
            && self.tails.len() == 1
            && self.shared_successors.is_empty()
            && self.dangling.is_empty()
            && self.unreachable.is_empty()
            && !self.has_cycle
            && self.chain.len() == self.node_count
    }
}

/// Scanner and repair tool sharing a collection's store and write gate
pub struct ConsistencyChecker<T> {
    collection: LinkedCollection<T>,
}

impl<T> ConsistencyChecker<T> {
    pub fn new(collection: LinkedCollection<T>) -> Self {
        Self { collection }
    }

    /// Scan the collection and report its link structure
    ///
    /// Holds the write gate for the duration of the scan so the report never
    /// reflects a half-finished insertion from this process.
    pub async fn check(&self) -> Result<ChainReport, LinkedListError> {
        let _gate = self.collection.acquire_write_gate().await?;

        let docs = self
            .collection
            .call(self.collection.store().find(&Filter::All, None))
            .await
            .map_err(|e| LinkedListError::store_unavailable("consistency scan", e))?;

        let links = docs
            .into_iter()
            .map(Link::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        let report = build_report(&links);
        if report.is_consistent() {
            tracing::debug!("List of {} node(s) is consistent", report.node_count);
        } else {
            tracing::warn!(
                "List is inconsistent: {} head(s), {} tail(s), {} unreachable, cycle: {}",
                report.heads.len(),
                report.tails.len(),
                report.unreachable.len(),
                report.has_cycle
            );
        }
        Ok(report)
    }

    /// Delete a node stranded by a failed insertion
    ///
    /// Only removes the node when no other node points at it and, if it is a
    /// head, another head exists. Returns `false` when the node is missing or
    /// still part of the list structure.
    pub async fn discard_unlinked(&self, id: &NodeId) -> Result<bool, LinkedListError> {
        let _gate = self.collection.acquire_write_gate().await?;
        let store = self.collection.store();

        let Some(doc) = self
            .collection
            .call(store.find_one(&Filter::id(id)))
            .await
            .map_err(|e| LinkedListError::store_unavailable("node lookup", e))?
        else {
            tracing::warn!("Cannot discard '{}': no such node", id);
            return Ok(false);
        };
        let node = Link::from_record(doc)?;

        let referrers = self
            .collection
            .call(store.find(&Filter::field_eq(NEXT_FIELD, id.clone()), Some(1)))
            .await
            .map_err(|e| LinkedListError::store_unavailable("referrer lookup", e))?;
        if !referrers.is_empty() {
            tracing::warn!("Cannot discard '{}': another node points at it", id);
            return Ok(false);
        }

        if node.head {
            let heads = self
                .collection
                .call(store.find(&Filter::field_eq(HEAD_FIELD, true), Some(2)))
                .await
                .map_err(|e| LinkedListError::store_unavailable("head lookup", e))?;
            if heads.len() < 2 {
                tracing::warn!("Cannot discard '{}': it is the only head", id);
                return Ok(false);
            }
        }

        let removed = self
            .collection
            .call(store.delete_one(&Filter::id(id).and(link_guard(&node))))
            .await
            .map_err(|e| LinkedListError::store_unavailable("node delete", e))?;

        if removed {
            tracing::info!("Discarded unlinked node '{}'", id);
        }
        Ok(removed)
    }
}

fn build_report(links: &[Link]) -> ChainReport {
    let by_id: HashMap<&NodeId, &Link> = links.iter().map(|l| (&l.id, l)).collect();

    let mut report = ChainReport {
        node_count: links.len(),
        ..Default::default()
    };

    let mut incoming: HashMap<&NodeId, usize> = HashMap::new();
    for link in links {
        if link.head {
            report.heads.push(link.id.clone());
        }
        match &link.next {
            None => report.tails.push(link.id.clone()),
            Some(next) if !by_id.contains_key(next) => {
                report.dangling.push((link.id.clone(), next.clone()));
            }
            Some(next) => *incoming.entry(next).or_default() += 1,
        }
    }
    report.shared_successors = incoming
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.clone())
        .collect();

    let mut visited: HashSet<&NodeId> = HashSet::new();
    let sole_head = match report.heads.as_slice() {
        [head] => Some(head.clone()),
        _ => None,
    };
    if let Some(head) = sole_head {
        let mut cursor = by_id.get(&head).copied();
        while let Some(link) = cursor {
            if !visited.insert(&link.id) {
                report.has_cycle = true;
                break;
            }
            report.chain.push(link.id.clone());
            cursor = link.next.as_ref().and_then(|next| by_id.get(next).copied());
        }
    }

    report.unreachable = links
        .iter()
        .filter(|l| !visited.contains(&l.id))
        .map(|l| l.id.clone())
        .collect();

    report.heads.sort();
    report.tails.sort();
    report.shared_successors.sort();
    report.unreachable.sort();
    report
}
