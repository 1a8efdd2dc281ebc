//! # Extension Registry
//!
//! Side-effecting operations plugged into the template evaluator. An extension is one
//! of exactly two shapes:
//!
//! | Shape | Syntax | Effect |
//! |-------|--------|--------|
//! | [`ValueFilter`] | `{{ value \| name(arg=...) }}` | returns a value substituted inline |
//! | [`StatementTag`] | `{% name var = ... %}` | writes `var` into the render context |
//!
//! Filters compose inside any expression but cannot name a variable; tags can, but
//! cannot be nested in an expression.
//!
//! ## Built-ins
//!
//! | Name | Shape | Purpose |
//! |------|-------|---------|
//! | `bash` | filter | pipe the value through a strict-mode shell script |
//! | `yaml` | filter | decode YAML text |
//! | `prompt` | filter | ask for text, the value is the default |
//! | `select` | filter | pick one element of an array |
//! | `ask` | tag | `{% ask var [matching "re"] = default %}` |
//! | `choose` | tag | `{% choose var = a, b, c %}` |

mod filters;
mod markup;
mod pattern;
mod tags;

pub use filters::{BashFilter, PromptFilter, SelectFilter, YamlFilter};
pub use markup::{AssignmentStatement, ChoiceStatement};
pub use pattern::PatternCache;
pub use tags::{AskTag, ChooseTag};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tera::{Tera, Value};

use crate::error::{QuillError, TagSyntaxError};

pub const BASH: &str = "bash";
pub const YAML: &str = "yaml";
pub const PROMPT: &str = "prompt";
pub const SELECT: &str = "select";
pub const ASK: &str = "ask";
pub const CHOOSE: &str = "choose";

/// Tag names owned by the evaluator itself.
const EVALUATOR_TAGS: &[&str] = &[
    "if", "elif", "else", "endif", "for", "endfor", "set", "set_global", "raw", "endraw",
    "block", "endblock", "extends", "include", "import", "macro", "endmacro", "filter",
    "endfilter", "break", "continue",
];

/// Expression-level transform: `(value, args) -> value`.
pub trait ValueFilter: Send + Sync {
    fn apply(&self, value: &Value, args: &HashMap<String, Value>) -> Result<Value, QuillError>;
}

/// Self-parsing statement, parsed once at load time.
pub trait StatementTag: Send + Sync {
    /// Parse the markup following the tag name into a render handler.
    fn parse(&self, markup: &str) -> Result<Box<dyn TagHandler>, TagSyntaxError>;
}

/// Parsed statement, run once per occurrence at render time.
pub trait TagHandler: Send + Sync {
    /// Variable the handler's result is stored under.
    fn target(&self) -> &str;

    /// Expressions to evaluate, in evaluation order, before [`TagHandler::render`].
    fn expressions(&self) -> &[String];

    /// Produce the value for [`TagHandler::target`] from the evaluated expressions.
    fn render(&self, values: Vec<Value>) -> Result<Value, QuillError>;
}

/// A registered extension.
#[derive(Clone)]
pub enum Extension {
    ValueFilter(Arc<dyn ValueFilter>),
    StatementTag(Arc<dyn StatementTag>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    ValueFilter,
    StatementTag,
}

impl Extension {
    pub fn filter(filter: impl ValueFilter + 'static) -> Self {
        Extension::ValueFilter(Arc::new(filter))
    }

    pub fn tag(tag: impl StatementTag + 'static) -> Self {
        Extension::StatementTag(Arc::new(tag))
    }

    pub fn kind(&self) -> ExtensionKind {
        match self {
            Extension::ValueFilter(_) => ExtensionKind::ValueFilter,
            Extension::StatementTag(_) => ExtensionKind::StatementTag,
        }
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

/// Name → extension table, immutable once the engine is built.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    extensions: BTreeMap<String, Extension>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension; names are unique across both shapes.
    pub fn register(&mut self, name: impl Into<String>, extension: Extension) -> Result<(), QuillError> {
        let name = name.into();
        if extension.kind() == ExtensionKind::StatementTag && EVALUATOR_TAGS.contains(&name.as_str()) {
            return Err(QuillError::ReservedName { name });
        }
        if self.extensions.contains_key(&name) {
            return Err(QuillError::DuplicateExtension { name });
        }
        self.extensions.insert(name, extension);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&Arc<dyn StatementTag>> {
        match self.extensions.get(name) {
            Some(Extension::StatementTag(tag)) => Some(tag),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    /// Register every value filter with the evaluator.
    ///
    /// Statement tags are bound per occurrence when a document is compiled.
    pub fn bind(&self, tera: &mut Tera) {
        for (name, extension) in &self.extensions {
            if let Extension::ValueFilter(filter) = extension {
                let filter = Arc::clone(filter);
                tera.register_filter(
                    name,
                    move |value: &Value, args: &HashMap<String, Value>| {
                        filter.apply(value, args).map_err(QuillError::into_tera)
                    },
                );
            }
        }
    }
}
