//! Document compilation
//!
//! The source is scanned once before the evaluator sees it. Each statement-tag
//! occurrence is parsed by its tag, then lowered into evaluator statements:
//!
//! ```text
//! {% choose size = 10, 20 %}
//!   => {% set __quill_0_0 = 10 %}{% set __quill_0_1 = 20 %}
//!      {% set __quill_0_value = __quill_choose_0(v0=__quill_0_0, v1=__quill_0_1) %}
//!      {% set_global size = __quill_0_value %}{% set size = __quill_0_value %}
//! ```
//!
//! (shown wrapped; the lowered statements are emitted on one line)
//!
//! Every expression is evaluated by the evaluator at the tag's position, in order and
//! exactly once. The bound function hands the values to the parsed handler. The
//! result goes to the global frame for everything rendered afterwards, and to the
//! current frame so a variable set earlier inside a loop does not hide it.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::sync::Arc;

use tera::{Context, Tera, Value};
use tracing::{debug, instrument};

use crate::error::{Location, QuillError};
use crate::extension::{PatternCache, Registry, TagHandler};

/// Prefix of every identifier introduced by lowering
const LOWERED_PREFIX: &str = "__quill";

/// A template block found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    /// `{{ ... }}`
    Expression(Range<usize>),
    /// `{% name markup %}`
    Statement {
        span: Range<usize>,
        name: Range<usize>,
        markup: Range<usize>,
        trim_left: bool,
        trim_right: bool,
    },
}

/// Split `source` into expression and statement blocks.
///
/// Comments and `raw` sections are skipped. An unterminated block ends the scan; the
/// evaluator reports it when parsing.
fn scan(source: &str) -> Vec<Block> {
    let bytes = source.as_bytes();
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(found) = source[pos..].find('{') {
        let start = pos + found;
        match bytes.get(start + 1) {
            Some(b'{') => {
                let Some(end) = find_close(source, start + 2, "}}") else {
                    break;
                };
                blocks.push(Block::Expression(start..end));
                pos = end;
            }
            Some(b'%') => {
                let Some(end) = find_close(source, start + 2, "%}") else {
                    break;
                };
                let block = statement(source, start..end);
                pos = end;
                if let Block::Statement { name, .. } = &block {
                    if &source[name.clone()] == "raw" {
                        match skip_raw(source, end) {
                            Some(after) => pos = after,
                            None => break,
                        }
                        continue;
                    }
                }
                blocks.push(block);
            }
            Some(b'#') => match source[start + 2..].find("#}") {
                Some(i) => pos = start + 2 + i + 2,
                None => break,
            },
            _ => pos = start + 1,
        }
    }

    blocks
}

/// Offset just past `close`, ignoring occurrences inside string literals.
fn find_close(source: &str, from: usize, close: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in source[from..].char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            _ if source[from + i..].starts_with(close) => return Some(from + i + close.len()),
            _ => {}
        }
    }
    None
}

fn statement(source: &str, span: Range<usize>) -> Block {
    let mut inner = span.start + 2..span.end - 2;
    let trim_left = source[inner.clone()].starts_with('-');
    if trim_left {
        inner.start += 1;
    }
    let trim_right = inner.end > inner.start && source[inner.clone()].ends_with('-');
    if trim_right {
        inner.end -= 1;
    }

    let body = &source[inner.clone()];
    let name_start = inner.start + (body.len() - body.trim_start().len());
    let name_len = source[name_start..inner.end]
        .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .unwrap_or(inner.end - name_start);

    Block::Statement {
        span,
        name: name_start..name_start + name_len,
        markup: name_start + name_len..inner.end,
        trim_left,
        trim_right,
    }
}

/// Offset just past the `endraw` statement closing a raw section.
fn skip_raw(source: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = source[pos..].find("{%") {
        let start = pos + found;
        let end = find_close(source, start + 2, "%}")?;
        if let Block::Statement { name, .. } = statement(source, start..end) {
            if &source[name] == "endraw" {
                return Some(end);
            }
        }
        pos = end;
    }
    None
}

/// Evaluator statements replacing tag occurrence `index`.
fn lower(
    tag: &str,
    index: usize,
    handler: &dyn TagHandler,
    trim_left: bool,
    trim_right: bool,
    newlines: usize,
) -> (String, String) {
    let open = if trim_left { "{%-" } else { "{%" };
    let close = if trim_right { "-%}" } else { "%}" };
    let function = format!("{LOWERED_PREFIX}_{tag}_{index}");
    let result = format!("{LOWERED_PREFIX}_{index}_value");
    let target = handler.target();

    let mut lowered = String::from(open);
    let mut args = Vec::with_capacity(handler.expressions().len());
    for (i, expr) in handler.expressions().iter().enumerate() {
        let temp = format!("{LOWERED_PREFIX}_{index}_{i}");
        lowered.push_str(&format!(" set {temp} = {expr} %}}{{%"));
        args.push(format!("v{i}={temp}"));
    }
    // A loop frame shadows the global one, so the result is written to both
    lowered.push_str(&format!(
        " set {result} = {function}({}) %}}{{% set_global {target} = {result} %}}{{% set {target} = {result} {}{close}",
        args.join(", "),
        "\n".repeat(newlines),
    ));

    (function, lowered)
}

/// A loaded document, ready to render.
pub struct Document {
    tera: Tera,
    name: String,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("name", &self.name).finish()
    }
}

impl Document {
    /// Scan, lower and parse `source` against a copy of `base`.
    #[instrument(skip_all, fields(name = %name, len = source.len()))]
    pub(crate) fn compile(
        base: &Tera,
        registry: &Registry,
        patterns: &PatternCache,
        name: &str,
        source: &str,
    ) -> Result<Self, QuillError> {
        let mut tera = base.clone();
        let mut lowered = String::with_capacity(source.len());
        let mut copied = 0;
        let mut occurrences = 0;

        for block in scan(source) {
            match block {
                Block::Expression(span) => {
                    check_patterns(patterns, name, source, span)?;
                }
                Block::Statement {
                    span,
                    name: tag_name,
                    markup,
                    trim_left,
                    trim_right,
                } => {
                    check_patterns(patterns, name, source, span.clone())?;
                    let tag_name = &source[tag_name];
                    let Some(tag) = registry.tag(tag_name) else {
                        continue;
                    };

                    let handler: Arc<dyn TagHandler> = tag
                        .parse(&source[markup])
                        .map_err(|details| QuillError::Load {
                            location: Location::at(name, source, span.start),
                            extension: tag_name.to_string(),
                            details,
                        })?
                        .into();

                    // Keep line numbers aligned for evaluator errors further down
                    let carried: usize = handler
                        .expressions()
                        .iter()
                        .map(|e| e.matches('\n').count())
                        .sum();
                    let newlines = source[span.clone()]
                        .matches('\n')
                        .count()
                        .saturating_sub(carried);
                    let (function, text) =
                        lower(tag_name, occurrences, handler.as_ref(), trim_left, trim_right, newlines);
                    debug!(tag = tag_name, function = %function, "lowered statement tag");

                    bind(&mut tera, &function, handler);
                    lowered.push_str(&source[copied..span.start]);
                    lowered.push_str(&text);
                    copied = span.end;
                    occurrences += 1;
                }
            }
        }
        lowered.push_str(&source[copied..]);

        tera.add_raw_template(name, &lowered)
            .map_err(|source| QuillError::Template {
                name: name.to_string(),
                source,
            })?;

        Ok(Self {
            tera,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render against `context`. Statement tags write into the render's own frames; the
    /// caller's context is never modified.
    #[instrument(skip_all, fields(name = %self.name))]
    pub fn render(&self, context: &Context) -> Result<String, QuillError> {
        self.tera
            .render(&self.name, context)
            .map_err(|source| QuillError::Render { source })
    }

    /// Render into `writer`.
    pub fn render_to(&self, context: &Context, writer: impl Write) -> Result<(), QuillError> {
        self.tera
            .render_to(&self.name, context, writer)
            .map_err(|source| QuillError::Render { source })
    }
}

fn check_patterns(
    patterns: &PatternCache,
    name: &str,
    source: &str,
    span: Range<usize>,
) -> Result<(), QuillError> {
    patterns
        .preflight(&source[span.clone()])
        .map(|_| ())
        .map_err(|(offset, details)| QuillError::Load {
            location: Location::at(name, source, span.start + offset),
            extension: crate::extension::PROMPT.to_string(),
            details,
        })
}

/// Expose `handler` to the evaluator as `function`.
fn bind(tera: &mut Tera, function: &str, handler: Arc<dyn TagHandler>) {
    let arity = handler.expressions().len();
    let name = function.to_string();
    tera.register_function(function, move |args: &HashMap<String, Value>| {
        let values = (0..arity)
            .map(|i| {
                args.get(&format!("v{i}"))
                    .cloned()
                    .ok_or_else(|| tera::Error::msg(format!("{name}: missing argument v{i}")))
            })
            .collect::<tera::Result<Vec<_>>>()?;
        handler.render(values).map_err(QuillError::into_tera)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(source: &str) -> Vec<String> {
        scan(source)
            .into_iter()
            .filter_map(|block| match block {
                Block::Statement { name, .. } => Some(source[name].to_string()),
                Block::Expression(span) => Some(source[span].to_string()),
            })
            .collect()
    }

    #[test]
    fn scan_finds_expressions_and_statements() {
        let source = "a {{ x }} b {% ask y = 1 %} c";
        assert_eq!(names(source), vec!["{{ x }}", "ask"]);
    }

    #[test]
    fn scan_reads_whitespace_control() {
        let source = "{%- choose x = 1, 2 -%}";
        let blocks = scan(source);
        match &blocks[0] {
            Block::Statement {
                name,
                markup,
                trim_left,
                trim_right,
                ..
            } => {
                assert_eq!(&source[name.clone()], "choose");
                assert_eq!(source[markup.clone()].trim(), "x = 1, 2");
                assert!(*trim_left && *trim_right);
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn scan_ignores_closers_inside_strings() {
        let source = r#"{% ask x = "50%} off" %}tail"#;
        let blocks = scan(source);
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::Statement { span, .. } => assert_eq!(&source[span.clone()], r#"{% ask x = "50%} off" %}"#),
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn scan_skips_comments_and_raw_sections() {
        let source = "{# {% ask a = 1 %} #}{% raw %}{% ask b = 2 %}{% endraw %}{% ask c = 3 %}";
        let found: Vec<String> = scan(source)
            .into_iter()
            .filter_map(|block| match block {
                Block::Statement { markup, .. } => Some(source[markup].trim().to_string()),
                Block::Expression(_) => None,
            })
            .collect();
        assert_eq!(found, vec!["c = 3"]);
    }

    #[test]
    fn scan_stops_at_unterminated_block() {
        assert!(scan("text {{ never closed").is_empty());
    }

    #[test]
    fn lowering_preserves_order_and_whitespace_control() {
        struct Fixed(Vec<String>);
        impl TagHandler for Fixed {
            fn target(&self) -> &str {
                "size"
            }
            fn expressions(&self) -> &[String] {
                &self.0
            }
            fn render(&self, values: Vec<Value>) -> Result<Value, QuillError> {
                Ok(Value::Array(values))
            }
        }

        let handler = Fixed(vec!["10".into(), "20".into()]);
        let (function, text) = lower("choose", 3, &handler, true, false, 1);
        assert_eq!(function, "__quill_choose_3");
        assert_eq!(
            text,
            concat!(
                "{%- set __quill_3_0 = 10 %}{% set __quill_3_1 = 20 %}",
                "{% set __quill_3_value = __quill_choose_3(v0=__quill_3_0, v1=__quill_3_1) %}",
                "{% set_global size = __quill_3_value %}{% set size = __quill_3_value \n%}",
            )
        );
    }
}
