//! Engine: configured evaluator plus the extension registry
//!
//! ```rust,ignore
//! let engine = Engine::builder().runtime(handle).build()?;
//! let document = engine.load("notes.md.tmpl")?;
//! let text = document.render(&tera::Context::new())?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tera::Tera;
use tokio::runtime::Handle;
use tracing::debug;

use crate::document::Document;
use crate::error::QuillError;
use crate::extension::{
    AskTag, BashFilter, ChooseTag, Extension, PatternCache, PromptFilter, Registry, SelectFilter,
    YamlFilter, ASK, BASH, CHOOSE, PROMPT, SELECT, YAML,
};
use crate::input::{InputProvider, TerminalInput};
use crate::shell::{Shell, ShellConfig};

/// Builder for [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    shell: ShellConfig,
    input: Option<Arc<dyn InputProvider>>,
    runtime: Option<Handle>,
    extensions: Vec<(String, Extension)>,
}

impl EngineBuilder {
    /// Shell used by the `bash` filter
    pub fn shell(mut self, config: ShellConfig) -> Self {
        self.shell = config;
        self
    }

    /// Input provider for prompts and selections (default: the terminal)
    pub fn input(mut self, input: Arc<dyn InputProvider>) -> Self {
        self.input = Some(input);
        self
    }

    /// Runtime that runs shell commands (default: the current one)
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Register an additional extension next to the built-ins
    pub fn extension(mut self, name: impl Into<String>, extension: Extension) -> Self {
        self.extensions.push((name.into(), extension));
        self
    }

    pub fn build(self) -> Result<Engine, QuillError> {
        let runtime = self
            .runtime
            .or_else(|| Handle::try_current().ok())
            .ok_or(QuillError::NoRuntime)?;
        let input = self
            .input
            .unwrap_or_else(|| Arc::new(TerminalInput::new()) as Arc<dyn InputProvider>);
        let patterns = PatternCache::new();

        let mut registry = Registry::new();
        registry.register(
            BASH,
            Extension::filter(BashFilter::new(Shell::new(self.shell), runtime)),
        )?;
        registry.register(YAML, Extension::filter(YamlFilter))?;
        registry.register(
            PROMPT,
            Extension::filter(PromptFilter::new(Arc::clone(&input), patterns.clone())),
        )?;
        registry.register(SELECT, Extension::filter(SelectFilter::new(Arc::clone(&input))))?;
        registry.register(ASK, Extension::tag(AskTag::new(Arc::clone(&input))))?;
        registry.register(CHOOSE, Extension::tag(ChooseTag::new(input)))?;
        for (name, extension) in self.extensions {
            registry.register(name, extension)?;
        }

        let mut tera = Tera::default();
        // Output is plain text whatever the file extension
        tera.autoescape_on(vec![]);
        registry.bind(&mut tera);
        debug!(extensions = ?registry.names().collect::<Vec<_>>(), "engine ready");

        Ok(Engine {
            tera,
            registry,
            patterns,
        })
    }
}

/// Loads documents against one configured evaluator
pub struct Engine {
    tera: Tera,
    registry: Registry,
    patterns: PatternCache,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parse `source` as a document called `name`.
    ///
    /// Statement-tag syntax and literal prompt patterns are checked here, before any
    /// rendering happens.
    pub fn compile(&self, name: &str, source: &str) -> Result<Document, QuillError> {
        Document::compile(&self.tera, &self.registry, &self.patterns, name, source)
    }

    /// Read and compile a document from disk; its path is its name.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Document, QuillError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        self.compile(&path.display().to_string(), &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionKind;

    #[test]
    fn build_without_runtime_fails() {
        let err = Engine::builder().build().err().unwrap();
        assert!(matches!(err, QuillError::NoRuntime));
    }

    #[test]
    fn builtins_are_registered() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = Engine::builder()
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        let registry = engine.registry();

        for name in [BASH, YAML, PROMPT, SELECT] {
            assert_eq!(registry.get(name).unwrap().kind(), ExtensionKind::ValueFilter);
        }
        for name in [ASK, CHOOSE] {
            assert_eq!(registry.get(name).unwrap().kind(), ExtensionKind::StatementTag);
        }
    }

    #[test]
    fn extension_cannot_shadow_builtin() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = Engine::builder()
            .runtime(runtime.handle().clone())
            .extension(YAML, Extension::filter(YamlFilter))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, QuillError::DuplicateExtension { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = Engine::builder()
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        let err = engine.load("/nonexistent/quill/doc.tmpl").unwrap_err();
        assert!(matches!(err, QuillError::Io(_)));
    }
}
