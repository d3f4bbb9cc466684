//! Integration tests: the persisted stylesheet under arbitrary caller input.
//!
//! Whatever id, property or value a caller sends, a write either is
//! rejected or lands in text that parses back. Other identities' styles
//! survive either way.

use livedom_core::model::{DomNode, DomTree};
use livedom_core::parser::parse_stylesheet;
use livedom_core::stylesheet::{to_camel_case, to_kebab_case};
use livedom_editor::{RuntimeConfig, StyleStore};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn page() -> (DomTree, StyleStore) {
    let mut tree = DomTree::new();
    let html = tree.append_child(tree.root, DomNode::element("html")).unwrap();
    tree.append_child(html, DomNode::element("head")).unwrap();
    tree.append_child(html, DomNode::element("body")).unwrap();
    let store = StyleStore::new(&RuntimeConfig::default());
    (tree, store)
}

fn persisted_text(tree: &DomTree, store: &StyleStore) -> String {
    store
        .container(tree)
        .map(|c| tree.direct_text(c))
        .unwrap_or_default()
}

// ─── Fixtures ────────────────────────────────────────────────────────────

#[test]
fn hostile_ids_keep_their_own_rules() {
    let (mut tree, store) = page();
    store.upsert(&mut tree, "ld-a", "color", "red").unwrap();
    for id in ["x;y", "}", "{", "a\"b", "a'b", "a\\", "/*", "]", "x=y", ""] {
        store.upsert(&mut tree, id, "width", "1px").unwrap();
        assert_eq!(
            store.query(&tree, id).get("width").map(String::as_str),
            Some("1px"),
            "id {id:?}"
        );
    }
    assert!(parse_stylesheet(&persisted_text(&tree, &store)).is_ok());
    assert_eq!(store.query(&tree, "ld-a").get("color").map(String::as_str), Some("red"));
}

// ─── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn any_write_is_rejected_or_round_trips(
        id in "\\PC{0,12}",
        property in "\\PC{0,12}",
        value in "\\PC{0,16}",
    ) {
        prop_assume!(id != "ld-keep");
        let (mut tree, store) = page();
        store.upsert(&mut tree, "ld-keep", "marginTop", "4px").unwrap();
        let before = persisted_text(&tree, &store);

        let written = store.upsert(&mut tree, &id, &property, &value);
        prop_assert!(parse_stylesheet(&persisted_text(&tree, &store)).is_ok());
        let kept = store.query(&tree, "ld-keep");
        prop_assert_eq!(
            kept.get("marginTop").map(String::as_str),
            Some("4px")
        );
        match written {
            Err(_) => {
                prop_assert_eq!(persisted_text(&tree, &store), before);
            }
            Ok(_) if !value.trim().is_empty() => {
                let key = to_camel_case(&to_kebab_case(&property));
                let queried = store.query(&tree, &id);
                prop_assert_eq!(
                    queried.get(&key).map(String::as_str),
                    Some(value.trim())
                );
            }
            Ok(_) => {}
        }
    }

    #[test]
    fn a_rejected_batch_writes_nothing(
        good in "[a-z]{1,8}",
        bad in prop_oneof![Just("'"), Just("("), Just(")"), Just("a;b"), Just("}"), Just("{")],
    ) {
        let (mut tree, store) = page();
        store.upsert(&mut tree, "ld-keep", "color", "red").unwrap();
        let before = persisted_text(&tree, &store);
        let result = store.update(&mut tree, "ld-b", [("width", good.as_str()), ("height", bad)]);
        prop_assert!(result.is_err());
        prop_assert_eq!(persisted_text(&tree, &store), before);
        prop_assert!(store.query(&tree, "ld-b").is_empty());
    }
}
