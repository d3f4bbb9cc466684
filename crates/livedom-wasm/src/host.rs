//! Host mirror: the page's DOM as JSON, converted into tree fragments.
//!
//! The page script observes the real document and forwards insertions,
//! removals and geometry as `HostNode` JSON. Applying them through the
//! recorded `DomTree` edits makes them show up as host mutation records.

use livedom_core::model::{ComputedStyle, DomNode, Fragment, InlineStyle, Rect};
use serde::Deserialize;
use std::collections::BTreeMap;

/// One host node and its subtree. Exactly one of `tag` or `text` is set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostNode {
    pub tag: Option<String>,
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
    /// Inline `style` attribute text.
    pub style: Option<String>,
    pub computed: Option<ComputedStyle>,
    pub bounds: Option<Rect>,
    pub children: Vec<HostNode>,
}

impl HostNode {
    pub fn into_fragment(self) -> Result<Fragment, String> {
        let mut node = match (self.tag, self.text) {
            (Some(tag), None) => DomNode::element(&tag),
            (None, Some(text)) => DomNode::text(&text),
            (Some(_), Some(_)) => return Err("host node has both tag and text".into()),
            (None, None) => return Err("host node has neither tag nor text".into()),
        };
        for (name, value) in &self.attributes {
            node.set_attr(name, value);
        }
        if let Some(style) = &self.style {
            node.style = InlineStyle::from_css_text(style);
        }
        if let Some(computed) = self.computed {
            node.computed = computed;
        }
        if let Some(bounds) = self.bounds {
            node.bounds = bounds;
        }

        let mut fragment = Fragment::new(node);
        for child in self.children {
            fragment = fragment.child(child.into_fragment()?);
        }
        Ok(fragment)
    }
}

/// Geometry and computed style refresh for an existing node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostMetrics {
    pub computed: Option<ComputedStyle>,
    pub bounds: Option<Rect>,
}
