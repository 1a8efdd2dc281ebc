//! Compiled validation patterns
//!
//! Literal `pattern` arguments of the `prompt` filter are compiled when a document is
//! loaded, so a bad regex fails before any interaction. Patterns only known at render
//! time are compiled on first use. Both paths share one cache.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::markup::split_top_level;
use super::PROMPT;
use crate::error::TagSyntaxError;

/// `| prompt(` with any spacing
static PROMPT_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\|\s*{PROMPT}\s*\(")).expect("static pattern is valid")
});

/// Pattern cache shared by the engine and its `prompt` filter
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    compiled: Arc<DashMap<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern`, reusing an earlier compilation.
    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, TagSyntaxError> {
        if let Some(cached) = self.compiled.get(pattern) {
            return Ok(Arc::clone(cached.value()));
        }
        let regex = Regex::new(pattern).map_err(|source| TagSyntaxError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let regex = Arc::new(regex);
        self.compiled.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Compile every literal `pattern=` argument of `prompt` calls in one template block.
    ///
    /// Returns the byte offset (within `block`) of the first failing call with its error.
    pub fn preflight(&self, block: &str) -> Result<usize, (usize, TagSyntaxError)> {
        let mut checked = 0;
        for call in PROMPT_CALL.find_iter(block) {
            let Some(args) = call_arguments(&block[call.end()..]) else {
                continue;
            };
            let Ok(args) = split_top_level(args) else {
                continue;
            };
            for arg in args {
                let Some((key, value)) = arg.split_once('=') else {
                    continue;
                };
                if key.trim() != "pattern" {
                    continue;
                }
                if let Some(literal) = string_literal(value.trim()) {
                    self.compile(literal).map_err(|e| (call.start(), e))?;
                    checked += 1;
                }
            }
        }
        Ok(checked)
    }
}

/// Text between an already-consumed `(` and its matching `)`.
fn call_arguments(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
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
            ')' if depth == 0 => return Some(&text[..i]),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

fn string_literal(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'))?;
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_caches_by_source() {
        let cache = PatternCache::new();
        let a = cache.compile("^[a-z]+$").unwrap();
        let b = cache.compile("^[a-z]+$").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn compile_reports_invalid_pattern() {
        let cache = PatternCache::new();
        let err = cache.compile("(").unwrap_err();
        assert!(matches!(err, TagSyntaxError::InvalidPattern { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn preflight_compiles_literal_patterns() {
        let cache = PatternCache::new();
        let block = r#"{{ "x" | prompt(label="Name", pattern="^(a|b)$") | upper }}"#;
        assert_eq!(cache.preflight(block).unwrap(), 1);
        assert!(cache.compile("^(a|b)$").is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn preflight_reports_offset_of_bad_call() {
        let cache = PatternCache::new();
        let block = r#"{{ "x" |prompt(pattern='[', label="L") }}"#;
        let (offset, err) = cache.preflight(block).unwrap_err();
        assert_eq!(offset, block.find('|').unwrap());
        assert!(matches!(err, TagSyntaxError::InvalidPattern { pattern, .. } if pattern == "["));
    }

    #[test]
    fn preflight_skips_dynamic_patterns() {
        let cache = PatternCache::new();
        let block = r#"{{ "x" | prompt(label="L", pattern=rules.name) }}"#;
        assert_eq!(cache.preflight(block).unwrap(), 0);
    }

    #[test]
    fn preflight_ignores_other_filters() {
        let cache = PatternCache::new();
        assert_eq!(cache.preflight(r#"{{ x | replace(from="(", to="") }}"#).unwrap(), 0);
    }
}
