//! Statement grammar for the built-in tags
//!
//! ```text
//! assignment := ident ("matching" string)? "=" expr
//! choice     := ident "=" expr ("," expr)*
//! ```
//!
//! Expressions are kept as source text for the evaluator. Splitting on commas only
//! happens outside string literals and brackets.

use regex::Regex;

use crate::error::TagSyntaxError;

const MATCHING: &str = "matching";

/// `var [matching "re"] = default`
#[derive(Debug, Clone)]
pub struct AssignmentStatement {
    pub target: String,
    pub pattern: Option<Regex>,
    pub default: String,
}

/// `var = a, b, c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceStatement {
    pub target: String,
    pub candidates: Vec<String>,
}

impl AssignmentStatement {
    pub fn parse(markup: &str) -> Result<Self, TagSyntaxError> {
        let (target, rest) = take_identifier(markup.trim_start())?;
        let rest = rest.trim_start();

        let (pattern, rest) = match strip_keyword(rest, MATCHING) {
            Some(after) => {
                let (literal, rest) = take_string(after.trim_start())?;
                let regex = Regex::new(literal).map_err(|source| TagSyntaxError::InvalidPattern {
                    pattern: literal.to_string(),
                    source,
                })?;
                (Some(regex), rest.trim_start())
            }
            None => (None, rest),
        };

        let default = take_assign(target, rest)?.trim();
        if default.is_empty() {
            return Err(TagSyntaxError::Malformed(format!(
                "missing default expression for '{target}'"
            )));
        }

        Ok(Self {
            target: target.to_string(),
            pattern,
            default: default.to_string(),
        })
    }
}

impl ChoiceStatement {
    pub fn parse(markup: &str) -> Result<Self, TagSyntaxError> {
        let (target, rest) = take_identifier(markup.trim_start())?;
        let list = take_assign(target, rest.trim_start())?;

        let candidates = split_top_level(list)?;
        if candidates.iter().all(|c| c.is_empty()) {
            return Err(TagSyntaxError::Malformed(format!(
                "no candidates for '{target}'"
            )));
        }
        if let Some(i) = candidates.iter().position(|c| c.is_empty()) {
            return Err(TagSyntaxError::Malformed(format!(
                "empty candidate #{} for '{target}'",
                i + 1
            )));
        }

        Ok(Self {
            target: target.to_string(),
            candidates: candidates.into_iter().map(str::to_string).collect(),
        })
    }
}

fn take_identifier(text: &str) -> Result<(&str, &str), TagSyntaxError> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
        .map_or(text.len(), |(i, _)| i);
    if end == 0 {
        return Err(TagSyntaxError::Malformed(format!(
            "expected a variable name, found '{}'",
            text.trim()
        )));
    }
    Ok(text.split_at(end))
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || is_quote(c) => Some(rest),
        _ => None,
    }
}

fn take_assign<'a>(target: &str, text: &'a str) -> Result<&'a str, TagSyntaxError> {
    match text.strip_prefix('=') {
        Some(rest) if !rest.starts_with('=') => Ok(rest),
        _ => Err(TagSyntaxError::Malformed(format!(
            "expected '=' after '{target}'"
        ))),
    }
}

/// Evaluator string literals have no escapes: content runs to the next matching quote.
fn take_string(text: &str) -> Result<(&str, &str), TagSyntaxError> {
    let mut chars = text.chars();
    let quote = chars
        .next()
        .filter(|&c| is_quote(c))
        .ok_or_else(|| TagSyntaxError::Malformed("expected a quoted pattern".to_string()))?;
    let body = &text[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| TagSyntaxError::Malformed("unterminated pattern string".to_string()))?;
    Ok((&body[..end], &body[end + 1..]))
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

/// Split on commas outside strings, parentheses, brackets and braces. Items are trimmed.
pub(crate) fn split_top_level(text: &str) -> Result<Vec<&str>, TagSyntaxError> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    TagSyntaxError::Malformed(format!("unbalanced '{c}' in '{}'", text.trim()))
                })?;
            }
            ',' if depth == 0 => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(TagSyntaxError::Malformed(format!(
            "unterminated string in '{}'",
            text.trim()
        )));
    }
    if depth != 0 {
        return Err(TagSyntaxError::Malformed(format!(
            "unclosed bracket in '{}'",
            text.trim()
        )));
    }
    items.push(text[start..].trim());
    Ok(items)
}
