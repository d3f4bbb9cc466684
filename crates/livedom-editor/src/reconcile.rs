//! Reconciliation of identity across host re-renders.
//!
//! When the host application re-renders, it may replace an element the
//! editor inserted or annotated with a structurally equivalent new element
//! that carries the same structural id but none of the editor's attributes.
//! The watcher pairs each such successor with its stale duplicate, copies
//! the editor's attributes across, and removes the duplicate.
//!
//! The handler is pure: it reads the tree and a batch of host mutation
//! records and returns the effects to apply.
//!
//! Pairing rule: within one batch, successors sharing a structural id are
//! taken in delivery order and paired with candidates in traversal order
//! (live candidates first, then ones the same batch removed), each
//! candidate used at most once.

use crate::config::RuntimeConfig;
use livedom_core::id::StableId;
use livedom_core::model::{DomNode, DomTree, Fragment, MutationRecord};
use livedom_core::mutation::TreeMutation;
use livedom_core::NodeIndex;
use std::collections::{HashMap, HashSet};

/// Where the stale duplicate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateSource {
    /// Still attached; the watcher removes it.
    Live(NodeIndex),
    /// Already removed by the host in the same batch.
    Detached,
}

/// One identity hand-over from a stale duplicate to its successor.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityTransfer {
    pub stable_id: Option<StableId>,
    pub structural_id: String,
    pub source: DuplicateSource,
    pub target: NodeIndex,
}

/// Effects for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub mutations: Vec<TreeMutation>,
    pub transfers: Vec<IdentityTransfer>,
    /// Parents whose layer trees should be rebuilt once the batch settles.
    pub rebuild: Vec<NodeIndex>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.transfers.is_empty() && self.rebuild.is_empty()
    }
}

struct Candidate<'a> {
    source: DuplicateSource,
    node: &'a DomNode,
}

#[derive(Debug, Clone)]
pub struct ReconciliationWatcher {
    config: RuntimeConfig,
}

impl ReconciliationWatcher {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Reconcile one batch of host mutation records against the tree the
    /// batch produced.
    pub fn reconcile(&self, tree: &DomTree, batch: &[MutationRecord]) -> Reconciliation {
        let mut out = Reconciliation::default();
        if batch.is_empty() {
            return out;
        }

        let mut rebuild_seen = HashSet::new();
        for record in batch {
            let parent = match record {
                MutationRecord::Added { parent, .. } | MutationRecord::Removed { parent, .. } => {
                    *parent
                }
                MutationRecord::Moved { to, .. } => *to,
            };
            if tree.contains(parent) && rebuild_seen.insert(parent) {
                out.rebuild.push(parent);
            }
        }

        let successors = self.successors(tree, batch);
        if successors.is_empty() {
            return out;
        }
        let fresh: HashSet<NodeIndex> = successors.iter().map(|(idx, _)| *idx).collect();
        let mut pools = self.candidates(tree, batch, &fresh);

        for (target, structural_id) in successors {
            let Some(pool) = pools.get_mut(structural_id.as_str()) else {
                continue;
            };
            // A duplicate that contains the successor cannot be removed
            // without taking the successor with it.
            let Some(pos) = pool.iter().position(|c| match c.source {
                DuplicateSource::Live(idx) => !tree.is_ancestor_of(idx, target),
                DuplicateSource::Detached => true,
            }) else {
                continue;
            };
            if pool.len() > 1 {
                log::warn!(
                    "{} candidates share structural id {structural_id}; taking the first",
                    pool.len()
                );
            }
            let candidate = pool.remove(pos);

            for name in self.config.transferred_attrs() {
                if let Some(value) = candidate.node.attr(name) {
                    out.mutations.push(TreeMutation::set_attr(target, name, value));
                }
            }
            if let DuplicateSource::Live(stale) = candidate.source {
                out.mutations.push(TreeMutation::Remove { node: stale });
            }

            let stable_id = candidate
                .node
                .attr(&self.config.stable_id_attr)
                .map(StableId::intern);
            log::debug!("transfer {stable_id:?} ({structural_id}) to {target:?}");
            out.transfers.push(IdentityTransfer {
                stable_id,
                structural_id,
                source: candidate.source,
                target,
            });
        }

        out
    }

    /// Newly inserted elements (including descendants of inserted
    /// subtrees) that carry a structural id, in delivery order.
    fn successors(&self, tree: &DomTree, batch: &[MutationRecord]) -> Vec<(NodeIndex, String)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in batch {
            let MutationRecord::Added { node, .. } = record else {
                continue;
            };
            for idx in tree.descendants(*node) {
                if !seen.insert(idx) {
                    continue;
                }
                let Some(n) = tree.node(idx) else {
                    continue;
                };
                if !n.is_element()
                    || n.has_attr(&self.config.placeholder_attr)
                    || n.has_attr(&self.config.inserted_attr)
                {
                    continue;
                }
                if let Some(sid) = n.attr(&self.config.structural_id_attr) {
                    out.push((idx, sid.to_string()));
                }
            }
        }
        out
    }

    /// Editor-inserted nodes with a structural id, grouped by that id:
    /// live ones in traversal order, then ones removed in this batch.
    fn candidates<'a>(
        &self,
        tree: &'a DomTree,
        batch: &'a [MutationRecord],
        fresh: &HashSet<NodeIndex>,
    ) -> HashMap<&'a str, Vec<Candidate<'a>>> {
        let mut pools: HashMap<&'a str, Vec<Candidate<'a>>> = HashMap::new();

        for idx in tree.descendants(tree.root) {
            if fresh.contains(&idx) {
                continue;
            }
            let Some(node) = tree.node(idx) else {
                continue;
            };
            if let Some(sid) = self.candidate_key(node) {
                pools.entry(sid).or_default().push(Candidate {
                    source: DuplicateSource::Live(idx),
                    node,
                });
            }
        }

        for record in batch {
            let MutationRecord::Removed { detached, .. } = record else {
                continue;
            };
            for f in detached.walk() {
                if let Some(sid) = self.candidate_key(&f.node) {
                    pools.entry(sid).or_default().push(Candidate {
                        source: DuplicateSource::Detached,
                        node: &f.node,
                    });
                }
            }
        }

        pools
    }

    fn candidate_key<'n>(&self, node: &'n DomNode) -> Option<&'n str> {
        if !node.is_element() || !node.has_attr(&self.config.inserted_attr) {
            return None;
        }
        node.attr(&self.config.structural_id_attr)
    }
}

/// Every detached subtree in a batch, for registry cleanup.
pub fn removed_fragments(batch: &[MutationRecord]) -> impl Iterator<Item = &Fragment> {
    batch.iter().filter_map(|r| match r {
        MutationRecord::Removed { detached, .. } => Some(detached),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inserted(oid: &str, id: &str) -> DomNode {
        DomNode::element("div")
            .with_attr("data-oid", oid)
            .with_attr("data-ld-id", id)
            .with_attr("data-ld-inserted", "true")
    }

    fn setup() -> (DomTree, NodeIndex, ReconciliationWatcher) {
        let mut tree = DomTree::new();
        let body = tree.append_child(tree.root, DomNode::element("body")).unwrap();
        tree.take_mutations();
        (tree, body, ReconciliationWatcher::new(&RuntimeConfig::default()))
    }

    #[test]
    fn live_duplicate_is_replaced() {
        let (mut tree, body, watcher) = setup();
        let stale = tree
            .append_child(body, inserted("x", "ld-s1").with_attr("data-ld-editing-text", "true"))
            .unwrap();
        tree.take_mutations();
        let fresh = tree
            .append_child(body, DomNode::element("div").with_attr("data-oid", "x"))
            .unwrap();

        let batch = tree.take_mutations();
        let result = watcher.reconcile(&tree, &batch);
        assert_eq!(
            result.mutations,
            vec![
                TreeMutation::set_attr(fresh, "data-ld-id", "ld-s1"),
                TreeMutation::set_attr(fresh, "data-ld-editing-text", "true"),
                TreeMutation::Remove { node: stale },
            ]
        );
        assert_eq!(result.transfers[0].source, DuplicateSource::Live(stale));
        assert_eq!(result.rebuild, vec![body]);
    }

    #[test]
    fn placeholders_and_editor_inserts_are_ignored() {
        let (mut tree, body, watcher) = setup();
        tree.append_child(body, inserted("x", "ld-s1")).unwrap();
        tree.take_mutations();
        tree.append_child(
            body,
            DomNode::element("div")
                .with_attr("data-oid", "x")
                .with_attr("data-ld-placeholder", "ld-s1"),
        )
        .unwrap();
        tree.append_child(body, inserted("x", "ld-s2")).unwrap();

        let batch = tree.take_mutations();
        let result = watcher.reconcile(&tree, &batch);
        assert!(result.transfers.is_empty());
        assert!(result.mutations.is_empty());
    }

    #[test]
    fn unmatched_successor_is_left_alone() {
        let (mut tree, body, watcher) = setup();
        tree.append_child(body, DomNode::element("div").with_attr("data-oid", "y"))
            .unwrap();
        let batch = tree.take_mutations();
        let result = watcher.reconcile(&tree, &batch);
        assert!(result.transfers.is_empty());
        assert_eq!(result.rebuild, vec![body]);
    }
}
