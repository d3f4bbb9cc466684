//! Descriptors that cross the call boundary.

use livedom_core::id::StableId;
use livedom_core::model::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live element as reported to the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomElement {
    pub dom_id: StableId,
    pub oid: Option<String>,
    pub instance_id: Option<String>,
    pub component_name: Option<String>,
    pub tag_name: String,
    pub rect: Rect,
    pub parent: Option<ParentElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<ElementStyles>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentElement {
    pub dom_id: StableId,
    pub oid: Option<String>,
    pub instance_id: Option<String>,
    pub tag_name: String,
    pub rect: Rect,
}

/// `defined` comes from the style store, `computed` from the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyles {
    pub defined: BTreeMap<String, String>,
    pub computed: BTreeMap<String, String>,
}

/// An element to create, as requested by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionElement {
    #[serde(default)]
    pub dom_id: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Written to the style store, keyed by the new element's dom id.
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub children: Vec<ActionElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InsertPosition {
    Append,
    Prepend,
    Index { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLocation {
    pub target_dom_id: String,
    #[serde(flatten)]
    pub position: InsertPosition,
}

/// Result of a flow drag that changed the element's sibling index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub new_index: usize,
    pub child: DomElement,
    pub parent: DomElement,
}

/// Result of an absolute-mode drag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub left: f32,
    pub top: f32,
}

/// What a finished drag reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DragResult {
    Moved(MoveResult),
    Positioned(PositionResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEditStart {
    pub original_content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEditEnd {
    pub new_content: String,
    pub dom_el: DomElement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn location_wire_format() {
        let loc: ActionLocation =
            serde_json::from_str(r#"{"targetDomId": "ld-a", "type": "index", "index": 2}"#)
                .unwrap();
        assert_eq!(loc.position, InsertPosition::Index { index: 2 });
        let loc: ActionLocation =
            serde_json::from_str(r#"{"targetDomId": "ld-a", "type": "prepend"}"#).unwrap();
        assert_eq!(loc.position, InsertPosition::Prepend);
    }

    #[test]
    fn action_element_defaults() {
        let el: ActionElement = serde_json::from_str(r#"{"tagName": "div"}"#).unwrap();
        assert_eq!(el.dom_id, None);
        assert!(el.children.is_empty());
        assert!(el.styles.is_empty());
    }
}
