//! Terminal input via rustyline
//!
//! Prompts open pre-filled with their default so the operator can edit it in place.
//! Selections print a numbered menu and read a 1-based choice. Prompts are drawn on
//! the terminal and menus on stderr; stdout is left to the rendered document.

use colored::Colorize;
use regex::Regex;
use rustyline::config::{Behavior, Config};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tera::Value;
use tracing::warn;

use super::{check, to_text, InputProvider};
use crate::error::InteractionError;

/// Interactive provider reading from the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalInput;

impl TerminalInput {
    pub fn new() -> Self {
        Self
    }

    fn editor() -> Result<DefaultEditor, InteractionError> {
        DefaultEditor::with_config(editor_config()).map_err(readline_error)
    }
}

impl InputProvider for TerminalInput {
    fn prompt(
        &self,
        label: &str,
        default: &str,
        validator: Option<&Regex>,
    ) -> Result<String, InteractionError> {
        let mut editor = Self::editor()?;
        let prompt = format!("{} ", format!("{label}:").bold());
        let mut initial = default.to_string();

        loop {
            let line = editor
                .readline_with_initial(&prompt, (initial.as_str(), ""))
                .map_err(readline_error)?;
            match check(validator, &line) {
                Ok(()) => return Ok(line),
                Err(message) => {
                    warn!(label = %label, "rejected input");
                    eprintln!("{} {}", "✗".red(), message);
                    initial = line;
                }
            }
        }
    }

    fn select(&self, label: &str, candidates: &[Value]) -> Result<usize, InteractionError> {
        if candidates.is_empty() {
            return Err(InteractionError::NoCandidates(label.to_string()));
        }

        let mut editor = Self::editor()?;
        eprintln!("{}", label.bold());
        for (i, candidate) in candidates.iter().enumerate() {
            eprintln!("  {} {}", format!("{}.", i + 1).cyan(), to_text(candidate));
        }

        let prompt = format!("{} ", format!("[1-{}]:", candidates.len()).bold());
        loop {
            let line = editor.readline(&prompt).map_err(readline_error)?;
            match line.trim().parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(n - 1),
                _ => {
                    warn!(label = %label, answer = %line.trim(), "rejected selection");
                    eprintln!(
                        "{} enter a number between 1 and {}",
                        "✗".red(),
                        candidates.len()
                    );
                }
            }
        }
    }
}

/// Talk to the controlling terminal even when stdout is redirected, so prompts never
/// end up in the rendered output.
fn editor_config() -> Config {
    Config::builder().behavior(Behavior::PreferTerm).build()
}

fn readline_error(err: ReadlineError) -> InteractionError {
    match err {
        ReadlineError::Interrupted => InteractionError::Interrupted,
        ReadlineError::Eof => InteractionError::Closed,
        other => InteractionError::Terminal(other.to_string()),
    }
}
