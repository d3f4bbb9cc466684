//! Identity-addressed persisted stylesheet.
//!
//! The sheet lives as the text of one reserved `<style>` element. Every
//! operation is a read-modify-write of that text: parse, edit the model,
//! emit. Unparsable text reads as an empty sheet, so a corrupted container
//! is overwritten by the next write instead of blocking the caller.

use crate::config::RuntimeConfig;
use livedom_core::emitter::emit_stylesheet;
use livedom_core::model::{DomNode, DomTree};
use livedom_core::parser::parse_stylesheet;
use livedom_core::stylesheet::{Stylesheet, to_camel_case, to_kebab_case};
use livedom_core::NodeIndex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct StyleStore {
    container_id: String,
    id_attr: String,
}

impl StyleStore {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            container_id: config.style_container_id.clone(),
            id_attr: config.stable_id_attr.clone(),
        }
    }

    /// The reserved `<style>` element, if it exists.
    pub fn container(&self, tree: &DomTree) -> Option<NodeIndex> {
        tree.find_by_attr("id", &self.container_id)
            .filter(|idx| tree.node(*idx).and_then(DomNode::tag) == Some("style"))
    }

    /// Find or create the container: in `<head>` when there is one,
    /// otherwise under the first element of the document.
    fn ensure_container(&self, tree: &mut DomTree) -> Option<NodeIndex> {
        if let Some(idx) = self.container(tree) {
            return Some(idx);
        }
        let head = tree
            .descendants(tree.root)
            .into_iter()
            .find(|idx| tree.node(*idx).and_then(DomNode::tag) == Some("head"));
        let parent = head
            .or_else(|| tree.element_children(tree.root).into_iter().next())
            .unwrap_or(tree.root);
        log::debug!("creating style container #{}", self.container_id);
        tree.append_child(
            parent,
            DomNode::element("style").with_attr("id", &self.container_id),
        )
    }

    /// Parse the persisted sheet. Never fails.
    pub fn read(&self, tree: &DomTree) -> Stylesheet {
        let Some(container) = self.container(tree) else {
            return Stylesheet::new();
        };
        let text = tree.direct_text(container);
        match parse_stylesheet(&text) {
            Ok(sheet) => sheet,
            Err(e) => {
                log::warn!("persisted stylesheet is malformed, treating as empty: {e}");
                Stylesheet::new()
            }
        }
    }

    /// Serialize and persist `sheet`.
    pub fn write(&self, tree: &mut DomTree, sheet: &Stylesheet) {
        let text = emit_stylesheet(sheet);
        if self
            .container(tree)
            .is_some_and(|c| tree.direct_text(c) == text)
        {
            return;
        }
        if let Some(container) = self.ensure_container(tree) {
            tree.set_text_content(container, &text);
        }
    }

    /// Set one property on `id`. The property may be camelCase or
    /// kebab-case; an empty value deletes it. Returns whether the sheet
    /// changed.
    pub fn upsert(
        &self,
        tree: &mut DomTree,
        id: &str,
        property: &str,
        value: &str,
    ) -> Result<bool, String> {
        self.update(tree, id, [(property, value)])
    }

    /// Apply several upserts in one read-modify-write. If any change would
    /// not parse back, nothing is written.
    pub fn update<'p>(
        &self,
        tree: &mut DomTree,
        id: &str,
        changes: impl IntoIterator<Item = (&'p str, &'p str)>,
    ) -> Result<bool, String> {
        let mut sheet = self.read(tree);
        let mut changed = false;
        for (property, value) in changes {
            changed |= sheet.upsert(&self.id_attr, id, &to_kebab_case(property), value)?;
        }
        if changed {
            self.write(tree, &sheet);
        }
        Ok(changed)
    }

    /// Delete the named properties from every rule selecting `id`.
    pub fn remove(&self, tree: &mut DomTree, id: &str, properties: &[&str]) -> bool {
        let mut sheet = self.read(tree);
        let kebab: Vec<String> = properties.iter().map(|p| to_kebab_case(p)).collect();
        let names: Vec<&str> = kebab.iter().map(String::as_str).collect();
        let changed = sheet.remove(&self.id_attr, id, &names);
        if changed {
            self.write(tree, &sheet);
        }
        changed
    }

    /// Merged declarations for `id`, keyed by camelCase property name.
    pub fn query(&self, tree: &DomTree, id: &str) -> BTreeMap<String, String> {
        self.read(tree)
            .query(&self.id_attr, id)
            .into_iter()
            .map(|d| (to_camel_case(&d.property), d.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (DomTree, StyleStore, NodeIndex) {
        let mut tree = DomTree::new();
        let html = tree.append_child(tree.root, DomNode::element("html")).unwrap();
        let head = tree.append_child(html, DomNode::element("head")).unwrap();
        tree.append_child(html, DomNode::element("body")).unwrap();
        (tree, StyleStore::new(&RuntimeConfig::default()), head)
    }

    #[test]
    fn first_write_creates_container_in_head() {
        let (mut tree, store, head) = setup();
        assert!(store.container(&tree).is_none());
        assert_eq!(store.upsert(&mut tree, "ld-a", "backgroundColor", "red"), Ok(true));
        let container = store.container(&tree).unwrap();
        assert_eq!(tree.parent(container), Some(head));
        assert_eq!(
            tree.direct_text(container),
            "[data-ld-id=\"ld-a\"] {\n  background-color: red;\n}\n"
        );
    }

    #[test]
    fn query_returns_camel_case() {
        let (mut tree, store, _) = setup();
        store.upsert(&mut tree, "ld-a", "margin-top", "4px").unwrap();
        store.upsert(&mut tree, "ld-a", "webkitTransform", "none").unwrap();
        let styles = store.query(&tree, "ld-a");
        assert_eq!(styles.get("marginTop").map(String::as_str), Some("4px"));
        assert_eq!(styles.get("WebkitTransform").map(String::as_str), Some("none"));
    }

    #[test]
    fn malformed_container_reads_empty_and_is_overwritten() {
        let (mut tree, store, head) = setup();
        let container = tree
            .append_child(
                head,
                DomNode::element("style").with_attr("id", "livedom-stylesheet"),
            )
            .unwrap();
        tree.append_child(container, DomNode::text("[data-ld-id=\"x\"] { color: "))
            .unwrap();
        assert!(store.read(&tree).is_empty());
        assert!(store.query(&tree, "x").is_empty());

        store.upsert(&mut tree, "ld-a", "color", "blue").unwrap();
        assert_eq!(store.query(&tree, "ld-a").len(), 1);
    }

    #[test]
    fn rejected_update_leaves_other_styles_intact() {
        let (mut tree, store, _) = setup();
        store.upsert(&mut tree, "ld-a", "color", "red").unwrap();
        let before = store.read(&tree);

        assert!(store.upsert(&mut tree, "ld-b", "content", "'").is_err());
        assert!(store.upsert(&mut tree, "ld-b", "font size", "12px").is_err());
        // One bad change in a batch rejects the whole batch.
        assert!(
            store
                .update(&mut tree, "ld-a", [("width", "1px"), ("height", "(")])
                .is_err()
        );
        assert_eq!(store.read(&tree), before);

        store.upsert(&mut tree, "x;y{}", "color", "blue").unwrap();
        assert_eq!(store.query(&tree, "ld-a").get("color").map(String::as_str), Some("red"));
        assert_eq!(store.query(&tree, "x;y{}").get("color").map(String::as_str), Some("blue"));
    }

    #[test]
    fn remove_accepts_either_casing() {
        let (mut tree, store, _) = setup();
        store
            .update(&mut tree, "ld-a", [("fontSize", "12px"), ("color", "red")])
            .unwrap();
        assert!(store.remove(&mut tree, "ld-a", &["font-size"]));
        assert!(store.remove(&mut tree, "ld-a", &["color"]));
        assert!(store.read(&tree).rules.is_empty());
        assert!(!store.remove(&mut tree, "ld-a", &["color"]));
    }
}
