//! CSS text → [`Stylesheet`].
//!
//! Built on `winnow` 0.7. Covers the subset the style container holds:
//! `/* comments */`, plain rules, quoted strings and parenthesised values
//! (`url(...)`, `calc(...)`), and at-rules, which are kept verbatim.
//! Anything unbalanced or unterminated is an error; callers fall back to an
//! empty sheet.

use crate::stylesheet::{Declaration, StyleRule, Stylesheet};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parse the text of the style container.
#[must_use = "parsing result should be used"]
pub fn parse_stylesheet(input: &str) -> Result<Stylesheet, String> {
    let mut sheet = Stylesheet::new();
    let mut rest = input;

    skip_ws_and_comments(&mut rest).map_err(|e| format!("Comment parse error: {e}"))?;

    while !rest.is_empty() {
        if rest.starts_with('@') {
            let block = parse_at_rule
                .parse_next(&mut rest)
                .map_err(|e| format!("At-rule parse error: {e}"))?;
            sheet.verbatim.push(block.to_string());
        } else {
            let rule = parse_rule
                .parse_next(&mut rest)
                .map_err(|e| format!("Rule parse error: {e}"))?;
            sheet.rules.push(rule);
        }

        skip_ws_and_comments(&mut rest).map_err(|e| format!("Comment parse error: {e}"))?;
    }

    log::trace!("parsed stylesheet: {} rules", sheet.rules.len());
    Ok(sheet)
}

/// Parse an inline `style` attribute (`color: red; width: 10px`).
#[must_use = "parsing result should be used"]
pub fn parse_declarations(input: &str) -> Result<Vec<Declaration>, String> {
    let mut rest = input;
    let declarations = parse_declaration_list
        .parse_next(&mut rest)
        .map_err(|e| format!("Declaration parse error: {e}"))?;
    if !rest.is_empty() {
        return Err(format!("Unexpected input in declarations: {rest:?}"));
    }
    Ok(declarations)
}

// ─── Validation ─────────────────────────────────────────────────────────

/// Check that `name` is a property name the parser reads back.
pub fn validate_property(name: &str) -> Result<(), String> {
    let mut rest = name;
    match parse_property.parse_next(&mut rest) {
        Ok(_) if rest.is_empty() => Ok(()),
        _ => Err(format!("Invalid property name: {name:?}")),
    }
}

/// Check that `value` is one complete declaration value: quotes and
/// parentheses balanced, no `{`, and no `;` or `}` outside them.
pub fn validate_value(value: &str) -> Result<(), String> {
    let mut rest = value;
    match parse_value(&mut rest) {
        Ok(_) if rest.is_empty() => Ok(()),
        Ok(_) => Err(format!("Value ends early at {rest:?}: {value:?}")),
        Err(_) => Err(format!("Unbalanced value: {value:?}")),
    }
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

fn skip_ws_and_comments(input: &mut &str) -> ModalResult<()> {
    loop {
        *input = input.trim_start();
        match input.strip_prefix("/*") {
            Some(after) => match after.find("*/") {
                Some(end) => *input = &after[end + 2..],
                None => return Err(cut()),
            },
            None => return Ok(()),
        }
    }
}

fn parse_property<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

/// Consume a declaration value up to (not including) the `;` or `}` that
/// ends it. Quotes and parentheses may contain either terminator.
fn parse_value<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let s = *input;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut end = s.len();

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(cut());
                }
                depth -= 1;
            }
            '{' if depth == 0 => return Err(cut()),
            ';' | '}' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth > 0 {
        return Err(cut());
    }
    *input = &s[end..];
    Ok(s[..end].trim())
}

fn parse_declaration_list(input: &mut &str) -> ModalResult<Vec<Declaration>> {
    let mut declarations = Vec::new();
    loop {
        skip_ws_and_comments(input)?;
        if input.is_empty() || input.starts_with('}') {
            break;
        }
        if let Some(after) = input.strip_prefix(';') {
            *input = after;
            continue;
        }

        let property = parse_property.parse_next(input)?;
        *input = input.trim_start();
        let _ = ':'.parse_next(input)?;
        let value = parse_value(input)?;
        if !value.is_empty() {
            declarations.push(Declaration::new(property, value));
        }
    }
    Ok(declarations)
}

/// Consume a selector up to the `{` that opens its block. Quoted attribute
/// values may contain any character.
fn parse_selector<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let s = *input;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => {
                *input = &s[i..];
                return Ok(s[..i].trim());
            }
            '}' | ';' => return Err(cut()),
            _ => {}
        }
    }
    Err(cut())
}

fn parse_rule(input: &mut &str) -> ModalResult<StyleRule> {
    let selector = parse_selector(input)?;
    if selector.is_empty() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    let _ = '{'.parse_next(input)?;
    let declarations = parse_declaration_list(input)?;
    let _ = '}'.parse_next(input)?;
    Ok(StyleRule {
        selector: selector.to_string(),
        declarations,
    })
}

/// `@import ...;` or `@media ... { ... }`, returned as written.
fn parse_at_rule<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let s = *input;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Err(cut());
                }
                depth -= 1;
                if depth == 0 {
                    *input = &s[i + 1..];
                    return Ok(s[..=i].trim());
                }
            }
            ';' if depth == 0 => {
                *input = &s[i + 1..];
                return Ok(s[..=i].trim());
            }
            _ => {}
        }
    }
    Err(cut())
}
