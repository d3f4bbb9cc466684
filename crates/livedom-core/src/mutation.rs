//! Effects on the document tree.
//!
//! Editor handlers never touch the tree directly: they return a list of
//! `TreeMutation`s and the session applies them in order. Structural
//! effects go through the recorded `DomTree` edits so they show up in the
//! mutation queue like any other change.

use crate::model::{DomTree, Fragment, InlineStyle};
use petgraph::graph::NodeIndex;

/// A single change to apply to the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeMutation {
    InsertBefore {
        parent: NodeIndex,
        fragment: Fragment,
        before: Option<NodeIndex>,
    },
    Remove {
        node: NodeIndex,
    },
    MoveBefore {
        node: NodeIndex,
        parent: NodeIndex,
        before: Option<NodeIndex>,
    },
    SetAttribute {
        node: NodeIndex,
        name: String,
        value: String,
    },
    RemoveAttribute {
        node: NodeIndex,
        name: String,
    },
    /// Set one inline declaration (kebab-case property).
    SetStyle {
        node: NodeIndex,
        property: String,
        value: String,
    },
    RemoveStyle {
        node: NodeIndex,
        property: String,
    },
    /// Replace the whole inline style with `css_text`.
    ReplaceStyle {
        node: NodeIndex,
        css_text: String,
    },
    SetText {
        node: NodeIndex,
        content: String,
    },
}

impl TreeMutation {
    pub fn set_attr(node: NodeIndex, name: &str, value: &str) -> Self {
        TreeMutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn remove_attr(node: NodeIndex, name: &str) -> Self {
        TreeMutation::RemoveAttribute {
            node,
            name: name.to_string(),
        }
    }

    pub fn set_style(node: NodeIndex, property: &str, value: &str) -> Self {
        TreeMutation::SetStyle {
            node,
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

/// What applying a mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Inserted(NodeIndex),
    Removed(Fragment),
    Done,
    /// The target no longer exists or the edit was refused.
    Skipped,
}

impl DomTree {
    /// Apply one effect. Stale targets are skipped, never a panic.
    pub fn apply(&mut self, mutation: TreeMutation) -> Applied {
        match mutation {
            TreeMutation::InsertBefore {
                parent,
                fragment,
                before,
            } => self
                .insert_before(parent, fragment, before)
                .map_or(Applied::Skipped, Applied::Inserted),
            TreeMutation::Remove { node } => {
                self.remove(node).map_or(Applied::Skipped, Applied::Removed)
            }
            TreeMutation::MoveBefore {
                node,
                parent,
                before,
            } => {
                if self.move_before(node, parent, before) {
                    Applied::Done
                } else {
                    Applied::Skipped
                }
            }
            TreeMutation::SetAttribute { node, name, value } => match self.node_mut(node) {
                Some(n) => {
                    n.set_attr(&name, &value);
                    Applied::Done
                }
                None => Applied::Skipped,
            },
            TreeMutation::RemoveAttribute { node, name } => match self.node_mut(node) {
                Some(n) => {
                    n.remove_attr(&name);
                    Applied::Done
                }
                None => Applied::Skipped,
            },
            TreeMutation::SetStyle {
                node,
                property,
                value,
            } => match self.node_mut(node) {
                Some(n) => {
                    n.style.set(&property, &value);
                    Applied::Done
                }
                None => Applied::Skipped,
            },
            TreeMutation::RemoveStyle { node, property } => match self.node_mut(node) {
                Some(n) => {
                    n.style.remove(&property);
                    Applied::Done
                }
                None => Applied::Skipped,
            },
            TreeMutation::ReplaceStyle { node, css_text } => match self.node_mut(node) {
                Some(n) => {
                    n.style = InlineStyle::from_css_text(&css_text);
                    Applied::Done
                }
                None => Applied::Skipped,
            },
            TreeMutation::SetText { node, content } => {
                if self.set_text_content(node, &content) {
                    Applied::Done
                } else {
                    Applied::Skipped
                }
            }
        }
    }

    /// Apply effects in order.
    pub fn apply_all(&mut self, mutations: impl IntoIterator<Item = TreeMutation>) -> Vec<Applied> {
        mutations.into_iter().map(|m| self.apply(m)).collect()
    }
}
