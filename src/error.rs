//! Error types with fix suggestions
//!
//! Every failure is fatal: load errors stop the document before rendering starts,
//! everything else aborts the render in progress.

use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Position of a construct in a template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Compute the 1-based line/column of `offset` inside `source`.
    pub fn at(name: &str, source: &str, offset: usize) -> Self {
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            name: name.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum QuillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Load errors (QUILL-010 to QUILL-014)
    // ─────────────────────────────────────────────────────────────

    #[error("QUILL-010: {location}: '{extension}': {details}")]
    Load {
        location: Location,
        extension: String,
        details: TagSyntaxError,
    },

    #[error("QUILL-011: failed to parse template '{name}'")]
    Template {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("QUILL-012: extension '{name}' is already registered")]
    DuplicateExtension { name: String },

    #[error("QUILL-013: '{name}' is a built-in template tag and cannot be redefined")]
    ReservedName { name: String },

    #[error("QUILL-014: no tokio runtime available to run shell commands")]
    NoRuntime,

    // ─────────────────────────────────────────────────────────────
    // Evaluation errors (QUILL-020 to QUILL-021)
    // ─────────────────────────────────────────────────────────────

    #[error("QUILL-020: render failed")]
    Render {
        #[source]
        source: tera::Error,
    },

    #[error("QUILL-021: {extension}: {details}")]
    InvalidArgument { extension: String, details: String },

    // ─────────────────────────────────────────────────────────────
    // Extension failures
    // ─────────────────────────────────────────────────────────────

    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

impl QuillError {
    pub(crate) fn invalid_argument(extension: &str, details: impl Into<String>) -> Self {
        QuillError::InvalidArgument {
            extension: extension.to_string(),
            details: details.into(),
        }
    }

    /// Which stage of the pipeline produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            QuillError::Io(_) => "io error",
            QuillError::Load { .. }
            | QuillError::Template { .. }
            | QuillError::DuplicateExtension { .. }
            | QuillError::ReservedName { .. }
            | QuillError::NoRuntime => "load error",
            QuillError::Render { .. } | QuillError::InvalidArgument { .. } => "evaluation error",
            QuillError::Shell(_) => "subprocess error",
            QuillError::Decode(_) => "decode error",
            QuillError::Interaction(_) => "interaction error",
        }
    }

    /// Wrap for the evaluator, keeping `self` reachable through the source chain.
    pub(crate) fn into_tera(self) -> tera::Error {
        tera::Error::chain(self.stage(), self)
    }
}

impl FixSuggestion for QuillError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            QuillError::Io(_) => Some("Check file path and permissions"),
            QuillError::Load { details, .. } => details.fix_suggestion(),
            QuillError::Template { .. } => Some("Check template syntax: {{ expr }}, {% tag %}, {# comment #}"),
            QuillError::DuplicateExtension { .. } => Some("Use a unique name for each extension"),
            QuillError::ReservedName { .. } => Some("Pick a tag name that is not a built-in keyword"),
            QuillError::NoRuntime => Some("Build the engine inside a tokio runtime or pass one explicitly"),
            QuillError::Render { .. } => Some("Check that every referenced variable is defined before use"),
            QuillError::InvalidArgument { .. } => Some("Check the filter's arguments and input type"),
            QuillError::Shell(_) => Some("Run the script by hand with `bash -c 'set -euo pipefail; ...'`"),
            QuillError::Decode(_) => Some("Check YAML syntax: indentation and quoting"),
            QuillError::Interaction(_) => Some("Run from an interactive terminal and answer every prompt"),
        }
    }
}

/// Malformed statement-tag markup, detected at load time.
#[derive(Error, Debug)]
pub enum TagSyntaxError {
    #[error("{0}")]
    Malformed(String),

    #[error("invalid validation pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl FixSuggestion for TagSyntaxError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TagSyntaxError::Malformed(_) => {
                Some("Use {% ask var = expr %} or {% choose var = expr, expr, ... %}")
            }
            TagSyntaxError::InvalidPattern { .. } => Some("Fix the regular expression syntax"),
        }
    }
}

/// What went wrong with a shell invocation.
#[derive(Error, Debug)]
pub enum ShellFailure {
    #[error("{0}")]
    Exit(ExitStatus),

    #[error("failed to spawn shell: {0}")]
    Spawn(std::io::Error),

    #[error("failed to write stdin: {0}")]
    Stdin(std::io::Error),

    #[error("failed to read output: {0}")]
    Output(std::io::Error),

    #[error("pipe task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Shell invocation failure: trimmed stderr text followed by the underlying failure.
#[derive(Debug)]
pub struct ShellError {
    pub stderr: String,
    pub failure: ShellFailure,
}

impl ShellError {
    pub fn new(stderr: impl Into<String>, failure: ShellFailure) -> Self {
        Self {
            stderr: stderr.into(),
            failure,
        }
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stderr.is_empty() {
            write!(f, "{}", self.failure)
        } else {
            write!(f, "{}: {}", self.stderr, self.failure)
        }
    }
}

impl std::error::Error for ShellError {}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("yaml: failed to decode: {0}")]
    Syntax(serde_yaml::Error),

    #[error("yaml: failed to decode: non-finite number {0}")]
    NonFinite(f64),

    #[error("yaml: failed to decode: unsupported mapping key {0}")]
    UnsupportedKey(String),
}

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("input aborted")]
    Interrupted,

    #[error("input stream closed")]
    Closed,

    #[error("nothing to select for '{0}'")]
    NoCandidates(String),

    #[error("selection {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("unexpected scripted answer: {0}")]
    Scripted(String),
}
