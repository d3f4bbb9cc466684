//! Runtime configuration.
//!
//! Attribute names are a contract with upstream build tooling (structural
//! and instance ids) and with the editor UI (markers), so every one of them
//! is configurable. A host may pass partial JSON; missing keys keep their
//! defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Editor-generated stable identity.
    pub stable_id_attr: String,
    /// Identity assigned by build tooling, stable per authored element.
    pub structural_id_attr: String,
    /// Distinguishes runtime instances of one structural id.
    pub instance_id_attr: String,
    pub component_name_attr: String,
    /// Marks elements the editor inserted itself.
    pub inserted_attr: String,
    /// Excludes a subtree from the layer tree.
    pub ignore_attr: String,
    /// Inline style captured at drag start.
    pub drag_saved_style_attr: String,
    pub dragging_attr: String,
    /// Present while a text edit is in progress.
    pub editing_attr: String,
    /// Marks drag placeholders; the value is the dragged node's stable id.
    pub placeholder_attr: String,
    /// `id` of the `<style>` element holding the persisted stylesheet.
    pub style_container_id: String,
    /// Tags never reported in the layer tree.
    pub ignored_tags: Vec<String>,
    /// Maximum characters in a layer's text preview.
    pub text_preview_len: usize,
    pub debounce_ms: u64,
    pub retry_interval_ms: u64,
    pub retry_max_attempts: u32,
    /// Pointer moves shorter than this (in px, on either axis) are ignored.
    pub min_drag_distance: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stable_id_attr: "data-ld-id".into(),
            structural_id_attr: "data-oid".into(),
            instance_id_attr: "data-oiid".into(),
            component_name_attr: "data-ocname".into(),
            inserted_attr: "data-ld-inserted".into(),
            ignore_attr: "data-ld-ignore".into(),
            drag_saved_style_attr: "data-ld-drag-saved-style".into(),
            dragging_attr: "data-ld-dragging".into(),
            editing_attr: "data-ld-editing-text".into(),
            placeholder_attr: "data-ld-placeholder".into(),
            style_container_id: "livedom-stylesheet".into(),
            ignored_tags: [
                "script", "style", "link", "meta", "noscript", "head", "title", "template",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            text_preview_len: 50,
            debounce_ms: 50,
            retry_interval_ms: 1000,
            retry_max_attempts: 20,
            min_drag_distance: 0.0,
        }
    }
}

impl RuntimeConfig {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_ignored_tag(&self, tag: &str) -> bool {
        self.ignored_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Attributes carried from a stale duplicate onto its successor.
    pub fn transferred_attrs(&self) -> [&str; 4] {
        [
            &self.stable_id_attr,
            &self.drag_saved_style_attr,
            &self.editing_attr,
            &self.instance_id_attr,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RuntimeConfig::from_json(r#"{"structuralIdAttr": "data-source-id", "debounceMs": 10}"#)
                .unwrap();
        assert_eq!(config.structural_id_attr, "data-source-id");
        assert_eq!(config.debounce_ms, 10);
        assert_eq!(config.stable_id_attr, "data-ld-id");
        assert_eq!(config.retry_max_attempts, 20);
    }

    #[test]
    fn ignored_tags_match_case_insensitively() {
        let config = RuntimeConfig::default();
        assert!(config.is_ignored_tag("SCRIPT"));
        assert!(!config.is_ignored_tag("div"));
    }
}
