//! Integration tests: stylesheet text → model → text.
//!
//! Verifies that a sheet built through upsert/remove survives emit and
//! re-parse unchanged, and that malformed text never escapes as a panic.

use livedom_core::emitter::emit_stylesheet;
use livedom_core::parser::parse_stylesheet;
use livedom_core::stylesheet::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const ATTR: &str = "data-ld-id";

// ─── Helpers ─────────────────────────────────────────────────────────────

fn assert_roundtrip(sheet: &Stylesheet) {
    let text = emit_stylesheet(sheet);
    let reparsed = parse_stylesheet(&text).expect("re-parse failed");
    assert_eq!(&reparsed, sheet, "sheet changed after round-trip:\n{text}");
    // Emitting is idempotent once canonical.
    assert_eq!(emit_stylesheet(&reparsed), text);
}

fn id_strategy() -> impl Strategy<Value = String> {
    "ld-[a-z0-9]{1,8}"
}

fn property_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("color".to_string()),
        Just("background-color".to_string()),
        Just("margin-top".to_string()),
        Just("--brand".to_string()),
        "[a-z]{1,6}(-[a-z]{1,6})?",
    ]
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9#.%]{1,10}",
        Just("url(\"a;b}.png\")".to_string()),
        Just("calc(100% - 4px)".to_string()),
        Just("'x'".to_string()),
    ]
}

// ─── Fixtures ────────────────────────────────────────────────────────────

#[test]
fn roundtrip_sheet_with_at_rules_and_foreign_rules() {
    let mut sheet = parse_stylesheet(
        r#"@import url("reset.css");
           body { margin: 0; }
           [data-ld-id="ld-a"] { color: red; }"#,
    )
    .unwrap();
    sheet.upsert(ATTR, "ld-a", "width", "10px").unwrap();
    sheet.upsert(ATTR, "ld-b", "opacity", "0.5").unwrap();
    sheet.remove(ATTR, "ld-a", &["color"]);
    assert_roundtrip(&sheet);

    assert_eq!(sheet.rules[0].selector, "body");
    assert_eq!(sheet.query(ATTR, "ld-a"), vec![Declaration::new("width", "10px")]);
}

#[test]
fn hierarchical_selectors_never_match() {
    let sheet = parse_stylesheet(
        r#"div [data-ld-id="ld-a"] { color: red; }
           [data-ld-id="ld-a"]:hover { color: blue; }
           [data-ld-id="ld-a"] { width: 1px; }"#,
    )
    .unwrap();
    assert_eq!(sheet.query(ATTR, "ld-a"), vec![Declaration::new("width", "1px")]);
}

#[test]
fn malformed_text_is_rejected_not_panicking() {
    for text in [
        "[data-ld-id=\"a\"] { color: red",
        "}}}",
        "a { b: url(( }",
        "/*",
        "@media {",
    ] {
        assert!(parse_stylesheet(text).is_err(), "accepted: {text}");
    }
}

// ─── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn upsert_then_query_contains_value(
        id in id_strategy(),
        prop in property_strategy(),
        val in value_strategy(),
    ) {
        let mut sheet = Stylesheet::new();
        sheet.upsert(ATTR, &id, &prop, &val).unwrap();
        let merged = sheet.query(ATTR, &id);
        prop_assert!(merged.contains(&Declaration::new(&prop, &val)));
    }

    #[test]
    fn clearing_omits_property(
        id in id_strategy(),
        prop in property_strategy(),
        val in value_strategy(),
    ) {
        let mut sheet = Stylesheet::new();
        sheet.upsert(ATTR, &id, &prop, &val).unwrap();
        sheet.upsert(ATTR, &id, "color", "red").unwrap();
        sheet.upsert(ATTR, &id, &prop, "").unwrap();
        prop_assert!(sheet.query(ATTR, &id).iter().all(|d| d.property != prop));
    }

    #[test]
    fn serialize_parse_is_idempotent(
        ops in prop::collection::vec(
            (id_strategy(), property_strategy(), prop::option::of(value_strategy())),
            0..24,
        ),
    ) {
        let mut sheet = Stylesheet::new();
        for (id, prop, val) in &ops {
            match val {
                Some(v) => { sheet.upsert(ATTR, id, prop, v).unwrap(); }
                None => { sheet.remove(ATTR, id, &[prop.as_str()]); }
            }
        }
        let text = emit_stylesheet(&sheet);
        let reparsed = parse_stylesheet(&text).expect("re-parse failed");
        prop_assert_eq!(&reparsed, &sheet);
        let again = parse_stylesheet(&emit_stylesheet(&reparsed)).expect("re-parse failed");
        prop_assert_eq!(again, reparsed);
    }

    #[test]
    fn arbitrary_writes_are_rejected_or_parse_back(
        id in "\\PC{0,12}",
        prop in "\\PC{0,12}",
        val in "\\PC{0,16}",
    ) {
        prop_assume!(id != "ld-keep");
        let mut sheet = Stylesheet::new();
        sheet.upsert(ATTR, "ld-keep", "color", "red").unwrap();
        let before = sheet.clone();

        let written = sheet.upsert(ATTR, &id, &prop, &val);
        if written.is_err() {
            prop_assert_eq!(&sheet, &before);
        }
        let reparsed = parse_stylesheet(&emit_stylesheet(&sheet)).expect("re-parse failed");
        prop_assert_eq!(&reparsed, &sheet);
        prop_assert_eq!(
            reparsed.query(ATTR, "ld-keep"),
            vec![Declaration::new("color", "red")]
        );
        if written.is_ok() && !val.trim().is_empty() {
            prop_assert_eq!(reparsed.query(ATTR, &id), vec![Declaration::new(&prop, val.trim())]);
        }
    }
}
