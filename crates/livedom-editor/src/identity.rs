//! Identity registry.
//!
//! Stable ids live in an explicit side table `StableId → NodeIndex`. The
//! attribute written onto the node is a checkpoint: it survives host
//! re-renders that keep the node, and it is what reconciliation copies onto
//! a successor. Cache entries are always validated against the attribute
//! before use, so a reused `NodeIndex` can never alias another node's id.

use crate::config::RuntimeConfig;
use livedom_core::id::StableId;
use livedom_core::model::{DomTree, Fragment};
use livedom_core::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the registry knows about one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub stable_id: Option<StableId>,
    pub structural_id: Option<String>,
    pub instance_id: Option<String>,
    pub component_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    stable_attr: String,
    structural_attr: String,
    instance_attr: String,
    component_attr: String,
    by_id: HashMap<StableId, NodeIndex>,
}

impl IdentityRegistry {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            stable_attr: config.stable_id_attr.clone(),
            structural_attr: config.structural_id_attr.clone(),
            instance_attr: config.instance_id_attr.clone(),
            component_attr: config.component_name_attr.clone(),
            by_id: HashMap::new(),
        }
    }

    /// Number of cached bindings (live or not yet validated).
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Return the node's stable id, assigning and persisting a fresh one
    /// if it has none. Idempotent. Returns `None` for removed nodes and
    /// for anything that is not an element.
    ///
    /// If the node's attribute names an id already bound to a different
    /// live node (for example an element cloned with its attributes), the
    /// node gets a fresh id so ids stay unique.
    pub fn get_or_assign(&mut self, tree: &mut DomTree, idx: NodeIndex) -> Option<StableId> {
        let node = tree.node(idx)?;
        if !node.is_element() {
            return None;
        }

        if let Some(existing) = node.attr(&self.stable_attr) {
            let id = StableId::intern(existing);
            match self.by_id.get(&id) {
                Some(&bound) if bound != idx && self.is_bound(tree, id, bound) => {
                    log::debug!("{id:?} already bound to {bound:?}, reassigning {idx:?}");
                }
                _ => {
                    self.by_id.insert(id, idx);
                    return Some(id);
                }
            }
        }

        let id = StableId::generate();
        tree.node_mut(idx)?.set_attr(&self.stable_attr, id.as_str());
        self.by_id.insert(id, idx);
        log::trace!("assigned {id:?} to {idx:?}");
        Some(id)
    }

    /// Read the stable id without assigning one.
    pub fn stable_id(&self, tree: &DomTree, idx: NodeIndex) -> Option<StableId> {
        tree.node(idx)?
            .attr(&self.stable_attr)
            .map(StableId::intern)
    }

    pub fn structural_id(&self, tree: &DomTree, idx: NodeIndex) -> Option<String> {
        tree.node(idx)?.attr(&self.structural_attr).map(String::from)
    }

    pub fn instance_id(&self, tree: &DomTree, idx: NodeIndex) -> Option<String> {
        tree.node(idx)?.attr(&self.instance_attr).map(String::from)
    }

    pub fn component_name(&self, tree: &DomTree, idx: NodeIndex) -> Option<String> {
        tree.node(idx)?.attr(&self.component_attr).map(String::from)
    }

    pub fn identity(&self, tree: &DomTree, idx: NodeIndex) -> Option<Identity> {
        tree.node(idx)?;
        Some(Identity {
            stable_id: self.stable_id(tree, idx),
            structural_id: self.structural_id(tree, idx),
            instance_id: self.instance_id(tree, idx),
            component_name: self.component_name(tree, idx),
        })
    }

    /// Find the live node carrying `id`. Falls back to a scan when the
    /// cached binding is stale, and repairs the cache either way.
    pub fn resolve(&mut self, tree: &DomTree, id: &str) -> Option<NodeIndex> {
        let key = StableId::existing(id);
        if let Some(key) = key
            && let Some(&idx) = self.by_id.get(&key)
            && self.is_bound(tree, key, idx)
        {
            return Some(idx);
        }

        match tree.find_by_attr(&self.stable_attr, id) {
            Some(idx) => {
                self.by_id.insert(StableId::intern(id), idx);
                Some(idx)
            }
            None => {
                if let Some(key) = key {
                    self.by_id.remove(&key);
                }
                None
            }
        }
    }

    /// Bind `id` to `idx`. Used after a reconciliation transfer.
    pub fn bind(&mut self, id: StableId, idx: NodeIndex) {
        self.by_id.insert(id, idx);
    }

    /// Drop bindings for nodes in a detached subtree. A binding is only
    /// dropped if it still points at the removed index; an id that was
    /// already rebound to a successor is left alone.
    pub fn forget_removed(&mut self, detached: &Fragment) {
        for f in detached.walk() {
            let (Some(origin), Some(value)) = (f.origin, f.node.attr(&self.stable_attr)) else {
                continue;
            };
            let Some(id) = StableId::existing(value) else {
                continue;
            };
            if self.by_id.get(&id) == Some(&origin) {
                self.by_id.remove(&id);
                log::trace!("forgot {id:?}");
            }
        }
    }

    fn is_bound(&self, tree: &DomTree, id: StableId, idx: NodeIndex) -> bool {
        tree.node(idx)
            .and_then(|n| n.attr(&self.stable_attr))
            .is_some_and(|v| v == id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedom_core::model::DomNode;
    use pretty_assertions::assert_eq;

    fn setup() -> (DomTree, IdentityRegistry, NodeIndex) {
        let mut tree = DomTree::new();
        let div = tree.append_child(tree.root, DomNode::element("div")).unwrap();
        (tree, IdentityRegistry::new(&RuntimeConfig::default()), div)
    }

    #[test]
    fn assign_is_idempotent_and_persisted() {
        let (mut tree, mut registry, div) = setup();
        let a = registry.get_or_assign(&mut tree, div).unwrap();
        let b = registry.get_or_assign(&mut tree, div).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.node(div).unwrap().attr("data-ld-id"), Some(a.as_str()));
        assert_eq!(registry.resolve(&tree, a.as_str()), Some(div));
    }

    #[test]
    fn existing_attribute_is_adopted() {
        let (mut tree, mut registry, _) = setup();
        let span = tree
            .append_child(tree.root, DomNode::element("span").with_attr("data-ld-id", "ld-kept"))
            .unwrap();
        assert_eq!(registry.get_or_assign(&mut tree, span).unwrap().as_str(), "ld-kept");
    }

    #[test]
    fn cloned_attribute_gets_a_fresh_id() {
        let (mut tree, mut registry, _) = setup();
        let first = tree
            .append_child(tree.root, DomNode::element("li").with_attr("data-ld-id", "ld-dup"))
            .unwrap();
        let second = tree
            .append_child(tree.root, DomNode::element("li").with_attr("data-ld-id", "ld-dup"))
            .unwrap();
        let a = registry.get_or_assign(&mut tree, first).unwrap();
        let b = registry.get_or_assign(&mut tree, second).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.get_or_assign(&mut tree, first), Some(a));
    }

    #[test]
    fn removed_and_non_element_nodes_are_no_ops() {
        let (mut tree, mut registry, div) = setup();
        let text = tree.append_child(div, DomNode::text("hi")).unwrap();
        assert_eq!(registry.get_or_assign(&mut tree, text), None);
        let root = tree.root;
        assert_eq!(registry.get_or_assign(&mut tree, root), None);

        let id = registry.get_or_assign(&mut tree, div).unwrap();
        let detached = tree.remove(div).unwrap();
        registry.forget_removed(&detached);
        assert_eq!(registry.get_or_assign(&mut tree, div), None);
        assert_eq!(registry.resolve(&tree, id.as_str()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_cache_falls_back_to_scan() {
        let (mut tree, mut registry, div) = setup();
        let id = registry.get_or_assign(&mut tree, div).unwrap();
        // Host replaced the node but kept the attribute.
        let mut fragment = tree.remove(div).unwrap();
        fragment.origin = None;
        let again = tree.append_child(tree.root, fragment).unwrap();
        assert_eq!(registry.resolve(&tree, id.as_str()), Some(again));
    }

    #[test]
    fn identity_reads_upstream_ids_without_assigning() {
        let (mut tree, registry, _) = setup();
        let node = DomNode::element("button")
            .with_attr("data-oid", "oid-1")
            .with_attr("data-oiid", "inst-1")
            .with_attr("data-ocname", "Button");
        let idx = tree.append_child(tree.root, node).unwrap();
        let identity = registry.identity(&tree, idx).unwrap();
        assert_eq!(identity.stable_id, None);
        assert_eq!(identity.structural_id.as_deref(), Some("oid-1"));
        assert_eq!(identity.instance_id.as_deref(), Some("inst-1"));
        assert_eq!(identity.component_name.as_deref(), Some("Button"));
        assert!(tree.node(idx).unwrap().attr("data-ld-id").is_none());
    }
}
