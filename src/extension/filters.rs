//! Built-in value filters

use std::collections::HashMap;
use std::sync::Arc;

use tera::Value;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tracing::debug;

use super::{PatternCache, ValueFilter, BASH, PROMPT, SELECT, YAML};
use crate::decode::decode;
use crate::error::{QuillError, ShellError, ShellFailure};
use crate::input::{choose, to_text, InputProvider};
use crate::shell::Shell;

fn string_arg<'a>(
    filter: &str,
    args: &'a HashMap<String, Value>,
    name: &str,
) -> Result<Option<&'a str>, QuillError> {
    match args.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(QuillError::invalid_argument(
            filter,
            format!("argument '{name}' must be a string, got {other}"),
        )),
    }
}

fn required_arg<'a>(
    filter: &str,
    args: &'a HashMap<String, Value>,
    name: &str,
) -> Result<&'a str, QuillError> {
    string_arg(filter, args, name)?
        .ok_or_else(|| QuillError::invalid_argument(filter, format!("missing argument '{name}'")))
}

/// `{{ text | bash(script="...") }}`: pipe the value through a shell script.
///
/// Runs on the render thread and blocks it until the script exits. Rendering may
/// happen on a plain thread or on a runtime worker; both are supported.
pub struct BashFilter {
    shell: Shell,
    runtime: Handle,
}

impl BashFilter {
    pub fn new(shell: Shell, runtime: Handle) -> Self {
        Self { shell, runtime }
    }

    fn run(&self, script: &str, input: &str) -> Result<String, ShellError> {
        let task = self.shell.execute(|_| script.to_string(), input);

        match Handle::try_current().map(|current| current.runtime_flavor()) {
            Err(_) => self.runtime.block_on(task),
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.runtime.block_on(task))
            }
            // A current-thread runtime is stalled while we block it, so the script gets
            // a runtime of its own on a separate thread
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| {
                        Builder::new_current_thread()
                            .enable_all()
                            .build()
                            .map_err(|e| ShellError::new("", ShellFailure::Spawn(e)))?
                            .block_on(task)
                    })
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            }),
        }
    }
}

impl ValueFilter for BashFilter {
    fn apply(&self, value: &Value, args: &HashMap<String, Value>) -> Result<Value, QuillError> {
        let script = required_arg(BASH, args, "script")?;
        let input = to_text(value);
        debug!(script = %script, input_len = input.len(), "bash filter");

        Ok(Value::String(self.run(script, &input)?))
    }
}

/// `{{ text | yaml }}`: decode YAML into a value.
pub struct YamlFilter;

impl ValueFilter for YamlFilter {
    fn apply(&self, value: &Value, _args: &HashMap<String, Value>) -> Result<Value, QuillError> {
        let text = value
            .as_str()
            .ok_or_else(|| QuillError::invalid_argument(YAML, format!("expects a string, got {value}")))?;
        Ok(decode(text)?)
    }
}

/// `{{ default | prompt(label="...", pattern="...") }}`: ask for text.
///
/// The answer is returned inline; storing it under a name is up to an enclosing `set`.
pub struct PromptFilter {
    input: Arc<dyn InputProvider>,
    patterns: PatternCache,
}

impl PromptFilter {
    pub fn new(input: Arc<dyn InputProvider>, patterns: PatternCache) -> Self {
        Self { input, patterns }
    }
}

impl ValueFilter for PromptFilter {
    fn apply(&self, value: &Value, args: &HashMap<String, Value>) -> Result<Value, QuillError> {
        let label = required_arg(PROMPT, args, "label")?;
        let validator = string_arg(PROMPT, args, "pattern")?
            .map(|p| self.patterns.compile(p))
            .transpose()
            .map_err(|e| QuillError::invalid_argument(PROMPT, e.to_string()))?;

        let answer = self
            .input
            .prompt(label, &to_text(value), validator.as_deref())?;
        Ok(Value::String(answer))
    }
}

/// `{{ items | select(label="...") }}`: pick one element of an array.
pub struct SelectFilter {
    input: Arc<dyn InputProvider>,
}

impl SelectFilter {
    pub fn new(input: Arc<dyn InputProvider>) -> Self {
        Self { input }
    }
}

impl ValueFilter for SelectFilter {
    fn apply(&self, value: &Value, args: &HashMap<String, Value>) -> Result<Value, QuillError> {
        let label = required_arg(SELECT, args, "label")?;
        let candidates = value
            .as_array()
            .ok_or_else(|| QuillError::invalid_argument(SELECT, format!("expects an array, got {value}")))?;
        Ok(choose(self.input.as_ref(), label, candidates.clone())?)
    }
}
