//! Emitter: [`Stylesheet`] → CSS text.
//!
//! Output round-trips through [`crate::parser::parse_stylesheet`].

use crate::stylesheet::{Declaration, StyleRule, Stylesheet};
use std::fmt::Write;

/// Emit a stylesheet. At-rules come first, in their original order, then
/// one block per rule.
#[must_use]
pub fn emit_stylesheet(sheet: &Stylesheet) -> String {
    let mut out = String::with_capacity(256);

    for block in &sheet.verbatim {
        out.push_str(block);
        out.push('\n');
    }
    if !sheet.verbatim.is_empty() && !sheet.rules.is_empty() {
        out.push('\n');
    }

    for (i, rule) in sheet.rules.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        emit_rule(&mut out, rule);
    }

    out
}

fn emit_rule(out: &mut String, rule: &StyleRule) {
    let _ = writeln!(out, "{} {{", rule.selector);
    for decl in &rule.declarations {
        let _ = writeln!(out, "  {}: {};", decl.property, decl.value);
    }
    out.push_str("}\n");
}

/// Emit declarations in inline `style` attribute form.
#[must_use]
pub fn emit_declarations(declarations: &[Declaration]) -> String {
    let mut out = String::new();
    for (i, decl) in declarations.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}: {};", decl.property, decl.value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;
    use pretty_assertions::assert_eq;

    #[test]
    fn emit_rule_block() {
        let mut sheet = Stylesheet::new();
        sheet.upsert("data-ld-id", "a", "color", "red").unwrap();
        sheet.upsert("data-ld-id", "a", "margin-top", "4px").unwrap();
        assert_eq!(
            emit_stylesheet(&sheet),
            "[data-ld-id=\"a\"] {\n  color: red;\n  margin-top: 4px;\n}\n"
        );
    }

    #[test]
    fn emit_then_parse_preserves_sheet() {
        let sheet = parse_stylesheet(
            "@media print { a { color: black; } }\n[data-ld-id=\"a\"] { background: url('x;y'); }\n.z { }",
        )
        .unwrap();
        let text = emit_stylesheet(&sheet);
        assert_eq!(parse_stylesheet(&text).unwrap(), sheet);
    }

    #[test]
    fn emit_inline_declarations() {
        let decls = vec![
            Declaration::new("color", "red"),
            Declaration::new("opacity", "0.5"),
        ];
        assert_eq!(emit_declarations(&decls), "color: red; opacity: 0.5;");
        assert_eq!(emit_declarations(&[]), "");
    }
}
