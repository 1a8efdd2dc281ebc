//! Quill - render templates with shell, prompt and YAML extensions

pub mod decode;
pub mod document;
pub mod engine;
pub mod error;
pub mod extension;
pub mod input;
pub mod shell;

pub use document::Document;
pub use engine::{Engine, EngineBuilder};
pub use error::{FixSuggestion, QuillError};
pub use extension::{Extension, ExtensionKind, Registry, StatementTag, TagHandler, ValueFilter};
pub use input::{Answer, InputProvider, ScriptedInput, TerminalInput};
pub use shell::{Shell, ShellConfig};
pub use tera::{Context, Value};
