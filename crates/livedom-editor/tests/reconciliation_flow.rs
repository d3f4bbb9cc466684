//! Integration tests: host re-renders (livedom-editor ↔ livedom-core).
//!
//! The host mutates the tree directly, the session drains the queued
//! records, and identity must follow the structural id onto the successor.

use livedom_core::model::{DomNode, DomTree};
use livedom_core::NodeIndex;
use livedom_editor::{EditorSession, RuntimeConfig, SessionEvent};
use pretty_assertions::assert_eq;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn page() -> (EditorSession, NodeIndex) {
    init_logger();
    let mut tree = DomTree::new();
    let html = tree.append_child(tree.root, DomNode::element("html")).unwrap();
    tree.append_child(html, DomNode::element("head")).unwrap();
    let body = tree
        .append_child(html, DomNode::element("body").with_attr("data-ld-id", "ld-body"))
        .unwrap();
    tree.take_mutations();
    (EditorSession::with_tree(tree, RuntimeConfig::default()), body)
}

fn editor_inserted(oid: &str, id: &str) -> DomNode {
    DomNode::element("section")
        .with_attr("data-oid", oid)
        .with_attr("data-ld-id", id)
        .with_attr("data-ld-inserted", "true")
}

fn host_rendered(oid: &str) -> DomNode {
    DomNode::element("section").with_attr("data-oid", oid)
}

// ─── Same-batch replacement ──────────────────────────────────────────────

#[test]
fn removed_and_reinserted_in_one_batch_keeps_identity() {
    let (mut session, body) = page();
    let a = session.tree.append_child(body, editor_inserted("X", "ld-s1")).unwrap();
    session.on_mutations(0);
    assert_eq!(session.resolve("ld-s1"), Some(a));

    // Host re-render: A goes, B arrives, one batch.
    session.tree.remove(a).unwrap();
    let b = session.tree.append_child(body, host_rendered("X")).unwrap();
    session.on_mutations(10);

    assert_eq!(session.resolve("ld-s1"), Some(b));
    assert_eq!(session.tree.node(b).unwrap().attr("data-ld-id"), Some("ld-s1"));
    assert_eq!(session.tree.find_all_with_attr("data-ld-id").len(), 2);

    let events = session.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::IdentityTransferred { dom_id: Some(id), structural_id }
            if id.as_str() == "ld-s1" && structural_id == "X"
    )));
}

#[test]
fn live_stale_duplicate_is_removed() {
    let (mut session, body) = page();
    let a = session.tree.append_child(body, editor_inserted("X", "ld-s1")).unwrap();
    session.on_mutations(0);
    session.start_editing_text("ld-s1").unwrap();

    let b = session.tree.append_child(body, host_rendered("X")).unwrap();
    session.on_mutations(10);

    assert!(!session.tree.contains(a));
    let node = session.tree.node(b).unwrap();
    assert_eq!(node.attr("data-ld-id"), Some("ld-s1"));
    assert_eq!(node.attr("data-ld-editing-text"), Some("true"));
    assert_eq!(session.get_element_index("ld-s1"), 0);
}

#[test]
fn sibling_successors_pair_in_order() {
    let (mut session, body) = page();
    let first = session.tree.append_child(body, editor_inserted("item", "ld-1")).unwrap();
    let second = session.tree.append_child(body, editor_inserted("item", "ld-2")).unwrap();
    session.on_mutations(0);

    session.tree.remove(first).unwrap();
    session.tree.remove(second).unwrap();
    let b1 = session.tree.append_child(body, host_rendered("item")).unwrap();
    let b2 = session.tree.append_child(body, host_rendered("item")).unwrap();
    session.on_mutations(10);

    assert_eq!(session.resolve("ld-1"), Some(b1));
    assert_eq!(session.resolve("ld-2"), Some(b2));
}

#[test]
fn unpreserved_structural_id_gets_fresh_identity() {
    let (mut session, body) = page();
    let a = session.tree.append_child(body, editor_inserted("X", "ld-s1")).unwrap();
    session.on_mutations(0);

    session.tree.remove(a).unwrap();
    let b = session.tree.append_child(body, host_rendered("Y")).unwrap();
    session.on_mutations(10);

    assert_eq!(session.resolve("ld-s1"), None);
    let described = session.get_element_by_dom_id("ld-s1", false);
    assert!(described.is_none());
    let fresh = session.describe(b, false).unwrap();
    assert_ne!(fresh.dom_id.as_str(), "ld-s1");
}

// ─── Rebuild scheduling ──────────────────────────────────────────────────

#[test]
fn burst_of_host_batches_builds_once() {
    let (mut session, body) = page();
    for (i, now) in [0u64, 20, 40].into_iter().enumerate() {
        session
            .tree
            .append_child(body, DomNode::element("p").with_attr("data-oid", &format!("p{i}")))
            .unwrap();
        session.on_mutations(now);
    }
    session.tick(80);
    assert!(session.drain_events().is_empty());

    session.tick(90);
    let events = session.drain_events();
    assert_eq!(events.len(), 1);
    let SessionEvent::LayerTreeUpdated { root, layers } = &events[0] else {
        panic!("expected a layer tree, got {events:?}");
    };
    assert_eq!(root.as_str(), "ld-body");
    assert_eq!(layers["ld-body"].children.len(), 3);
}

#[test]
fn editor_edits_during_a_host_burst_do_not_swallow_host_records() {
    let (mut session, body) = page();
    let a = session.tree.append_child(body, editor_inserted("X", "ld-s1")).unwrap();
    session.on_mutations(0);

    // Host re-render arrives, then the editor writes a style before the
    // host batch is drained.
    let b = session.tree.append_child(body, host_rendered("X")).unwrap();
    session.update_style("ld-s1", [("color", "red")]).unwrap();
    session.on_mutations(10);

    assert!(!session.tree.contains(a));
    assert_eq!(session.resolve("ld-s1"), Some(b));
    assert_eq!(
        session.get_styles("ld-s1").get("color").map(String::as_str),
        Some("red")
    );
}
