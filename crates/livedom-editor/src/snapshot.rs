//! Layer tree snapshots.
//!
//! A `LayerMap` is the serializable mirror of a tracked subtree that the
//! external editor renders as its layer panel. Building one walks the
//! subtree in pre-order and assigns stable ids to nodes seen for the first
//! time, so two builds over an unchanged tree produce identical maps.

use crate::config::RuntimeConfig;
use crate::identity::IdentityRegistry;
use livedom_core::id::StableId;
use livedom_core::model::{DomNode, DomTree};
use livedom_core::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerNode {
    pub stable_id: StableId,
    pub tag: String,
    pub visible: bool,
    /// Direct text children only, trimmed and truncated.
    pub text_preview: String,
    pub structural_id: Option<String>,
    pub instance_id: Option<String>,
    pub component_name: Option<String>,
    pub parent: Option<StableId>,
    pub children: Vec<StableId>,
}

/// Layers keyed by stable id.
pub type LayerMap = BTreeMap<String, LayerNode>;

/// Whether a node is excluded from the layer tree, along with its subtree.
pub fn is_filtered(node: &DomNode, config: &RuntimeConfig) -> bool {
    let Some(tag) = node.tag() else {
        return true;
    };
    config.is_ignored_tag(tag)
        || node.has_attr(&config.ignore_attr)
        || node.has_attr(&config.placeholder_attr)
        || !node.is_rendered()
}

/// The element a whole-document build starts from: `<body>` if present,
/// else the first unfiltered element child of the document. Filtered
/// elements (a style container written before the page loaded, scripts)
/// are skipped.
pub fn default_root(tree: &DomTree, config: &RuntimeConfig) -> Option<NodeIndex> {
    let top: Vec<NodeIndex> = tree
        .element_children(tree.root)
        .into_iter()
        .filter(|c| tree.node(*c).is_some_and(|n| !is_filtered(n, config)))
        .collect();
    let is_body = |idx: &NodeIndex| tree.node(*idx).and_then(DomNode::tag) == Some("body");
    if let Some(body) = top.iter().find(|c| is_body(*c)) {
        return Some(*body);
    }
    let first = *top.first()?;
    tree.element_children(first)
        .into_iter()
        .find(|c| is_body(c) && tree.node(*c).is_some_and(|n| !is_filtered(n, config)))
        .or(Some(first))
}

/// Nearest ancestor-or-self of `idx` that can root a build.
pub fn build_root_for(tree: &DomTree, idx: NodeIndex, config: &RuntimeConfig) -> Option<NodeIndex> {
    let mut current = Some(idx);
    while let Some(c) = current {
        if c == tree.root {
            break;
        }
        if let Some(node) = tree.node(c)
            && !is_filtered(node, config)
        {
            return Some(c);
        }
        current = tree.parent(c);
    }
    default_root(tree, config)
}

/// Cut a text preview to `max` characters.
pub fn truncate_preview(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

/// Build the layer map for the subtree at `root`. Returns `None` when the
/// root itself is filtered or no longer exists.
pub fn build_layer_tree(
    tree: &mut DomTree,
    registry: &mut IdentityRegistry,
    config: &RuntimeConfig,
    root: NodeIndex,
) -> Option<LayerMap> {
    if is_filtered(tree.node(root)?, config) {
        return None;
    }

    let mut layers = LayerMap::new();
    let root_parent = tree
        .parent(root)
        .and_then(|p| registry.stable_id(tree, p));
    let mut stack: Vec<(NodeIndex, Option<StableId>)> = vec![(root, root_parent)];

    while let Some((idx, parent)) = stack.pop() {
        let Some(id) = registry.get_or_assign(tree, idx) else {
            continue;
        };

        let children: Vec<NodeIndex> = tree
            .element_children(idx)
            .into_iter()
            .filter(|c| tree.node(*c).is_some_and(|n| !is_filtered(n, config)))
            .collect();

        let mut child_ids = Vec::with_capacity(children.len());
        for &c in &children {
            if let Some(cid) = registry.get_or_assign(tree, c) {
                child_ids.push(cid);
            }
        }

        let Some(node) = tree.node(idx) else {
            continue;
        };
        let layer = LayerNode {
            stable_id: id,
            tag: node.tag().unwrap_or_default().to_string(),
            visible: node.is_visible(),
            text_preview: truncate_preview(&tree.direct_text(idx), config.text_preview_len),
            structural_id: registry.structural_id(tree, idx),
            instance_id: registry.instance_id(tree, idx),
            component_name: registry.component_name(tree, idx),
            parent,
            children: child_ids,
        };
        layers.insert(id.as_str().to_string(), layer);

        for &c in children.iter().rev() {
            stack.push((c, Some(id)));
        }
    }

    log::trace!("built {} layers", layers.len());
    Some(layers)
}
