//! Identity-addressed stylesheet model.
//!
//! Rules select exactly one tracked node through an attribute selector of
//! the form `[data-ld-id="<id>"]`. Matching is exact: a rule whose selector
//! is anything other than that single attribute test never matches, even if
//! it would select the node in a browser.

use crate::parser::{validate_property, validate_value};
use serde::{Deserialize, Serialize};

/// A single `property: value` pair. Property names are stored in the
/// persisted (kebab-case) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

/// `selector { declarations }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declarations: Vec::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }
}

/// The persisted stylesheet.
///
/// `verbatim` holds at-rule blocks (`@media`, `@import`, ...) exactly as
/// they were read; they are carried through rewrites untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
    pub verbatim: Vec<String>,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.verbatim.is_empty()
    }

    /// Indices of rules selecting `id` through `attr`, in document order.
    pub fn matching_rules(&self, attr: &str, id: &str) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| selector_identity(&r.selector, attr).as_deref() == Some(id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Set `property` (kebab-case) on `id`. An empty value deletes the
    /// declaration and drops rules left empty. Returns whether anything
    /// changed, or an error (and no change) if the property or value would
    /// not parse back.
    pub fn upsert(
        &mut self,
        attr: &str,
        id: &str,
        property: &str,
        value: &str,
    ) -> Result<bool, String> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self.remove(attr, id, &[property]));
        }
        validate_property(property)?;
        validate_value(value)?;

        let matching = self.matching_rules(attr, id);
        let mut changed = false;
        let mut found = false;
        for &i in &matching {
            for decl in self.rules[i]
                .declarations
                .iter_mut()
                .filter(|d| d.property == property)
            {
                found = true;
                if decl.value != value {
                    decl.value = value.to_string();
                    changed = true;
                }
            }
        }
        if found {
            return Ok(changed);
        }

        match matching.last() {
            Some(&i) => self.rules[i]
                .declarations
                .push(Declaration::new(property, value)),
            None => {
                let mut rule = StyleRule::new(identity_selector(attr, id));
                rule.declarations.push(Declaration::new(property, value));
                self.rules.push(rule);
            }
        }
        Ok(true)
    }

    /// Delete `properties` (kebab-case) from every rule selecting `id`.
    /// Rules emptied by the deletion are dropped; others are kept.
    pub fn remove(&mut self, attr: &str, id: &str, properties: &[&str]) -> bool {
        let matching = self.matching_rules(attr, id);
        if matching.is_empty() {
            return false;
        }
        let mut changed = false;
        for &i in &matching {
            let before = self.rules[i].declarations.len();
            self.rules[i]
                .declarations
                .retain(|d| !properties.contains(&d.property.as_str()));
            changed |= self.rules[i].declarations.len() != before;
        }
        if changed {
            let mut index = 0;
            self.rules.retain(|r| {
                let keep = !(matching.contains(&index) && r.declarations.is_empty());
                index += 1;
                keep
            });
        }
        changed
    }

    /// Merge declarations from every rule selecting `id`. Later rules and
    /// later declarations win. Keys stay kebab-case, in first-seen order.
    pub fn query(&self, attr: &str, id: &str) -> Vec<Declaration> {
        let mut merged: Vec<Declaration> = Vec::new();
        for i in self.matching_rules(attr, id) {
            for decl in &self.rules[i].declarations {
                match merged.iter_mut().find(|d| d.property == decl.property) {
                    Some(existing) => existing.value = decl.value.clone(),
                    None => merged.push(decl.clone()),
                }
            }
        }
        merged
    }
}

// ─── Selectors ───────────────────────────────────────────────────────────

/// Build the canonical selector addressing `id`: `[attr="id"]`.
pub fn identity_selector(attr: &str, id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{attr}=\"{escaped}\"]")
}

/// If `selector` is exactly one attribute-equality test on `attr`, return
/// the id it names. Anything else (compound, descendant, other attribute,
/// substring operators) yields `None`.
pub fn selector_identity(selector: &str, attr: &str) -> Option<String> {
    let inner = selector.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (name, value) = inner.split_once('=')?;
    if name.trim() != attr {
        return None;
    }
    let value = value.trim();
    let unquoted = if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        unescape(&value[1..value.len() - 1])
    } else {
        if value.is_empty() || value.contains(['"', '\'', '[', ']', ' ']) {
            return None;
        }
        value.to_string()
    };
    Some(unquoted)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ─── Property name casing ────────────────────────────────────────────────

/// `backgroundColor` → `background-color`, `WebkitTransform` and
/// `webkitTransform` → `-webkit-transform`, `msTransform` →
/// `-ms-transform`. Custom properties and names already in kebab-case pass
/// through.
pub fn to_kebab_case(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") || !name.chars().any(|c| c.is_ascii_uppercase()) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    if VENDOR_PREFIXES.iter().any(|p| out.starts_with(p)) {
        out.insert(0, '-');
    }
    out
}

const VENDOR_PREFIXES: [&str; 4] = ["webkit-", "moz-", "ms-", "o-"];

/// Inverse of [`to_kebab_case`].
pub fn to_camel_case(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") {
        return name.to_string();
    }
    let name = name.strip_prefix("-ms-").map_or(name.to_string(), |rest| format!("ms-{rest}"));
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
