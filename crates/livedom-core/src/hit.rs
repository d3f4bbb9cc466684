//! Hit testing: point → deepest node.
//!
//! How a host finds the element under the pointer is environment-specific
//! (shadow roots, iframes, stacking contexts). Callers depend only on
//! [`PointResolver`]; [`GeometryResolver`] is the default that walks
//! `DomNode::bounds`.

use crate::model::{DomTree, NodeKind};
use petgraph::graph::NodeIndex;

/// "Resolve the deepest element at a point", supplied by the host.
pub trait PointResolver {
    fn resolve(&self, tree: &DomTree, x: f32, y: f32) -> Option<NodeIndex>;
}

/// Reverse-walks the tree (last painted = topmost) and returns the deepest
/// rendered element whose bounds contain the point.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryResolver;

impl PointResolver for GeometryResolver {
    fn resolve(&self, tree: &DomTree, x: f32, y: f32) -> Option<NodeIndex> {
        hit_test_node(tree, tree.root, x, y)
    }
}

fn hit_test_node(tree: &DomTree, idx: NodeIndex, x: f32, y: f32) -> Option<NodeIndex> {
    let node = tree.node(idx)?;
    if !node.is_rendered() {
        return None;
    }

    // Children in reverse (topmost first)
    for &child in tree.children(idx).iter().rev() {
        if let Some(hit) = hit_test_node(tree, child, x, y) {
            return Some(hit);
        }
    }

    match node.kind {
        NodeKind::Element { .. } if node.bounds.contains(x, y) => Some(idx),
        _ => None,
    }
}

/// Any closure over the tree is a resolver, which keeps test hosts short.
impl<F> PointResolver for F
where
    F: Fn(&DomTree, f32, f32) -> Option<NodeIndex>,
{
    fn resolve(&self, tree: &DomTree, x: f32, y: f32) -> Option<NodeIndex> {
        self(tree, x, y)
    }
}
