//! # Interactive Input
//!
//! Blocking collection of values from an operator while a document renders.
//!
//! - [`InputProvider`] - Core trait: free-text prompts and single-choice selection
//! - [`TerminalInput`] - Production provider using a line editor on the terminal
//! - [`ScriptedInput`] - Test provider replaying queued answers
//!
//! Selection returns an index; [`choose`] turns it back into the candidate itself so
//! candidates are never evaluated a second time.

mod mock;
mod terminal;

pub use mock::{Answer, Request, ScriptedInput};
pub use terminal::TerminalInput;

use regex::Regex;
use tera::Value;

use crate::error::InteractionError;

/// Source of interactively collected values.
pub trait InputProvider: Send + Sync {
    /// Ask for one line of text, pre-filled with `default`.
    ///
    /// When `validator` is given, the returned text matches it; invalid answers are
    /// retried by the provider itself.
    fn prompt(
        &self,
        label: &str,
        default: &str,
        validator: Option<&Regex>,
    ) -> Result<String, InteractionError>;

    /// Present `candidates` in order and return the index of the chosen one.
    fn select(&self, label: &str, candidates: &[Value]) -> Result<usize, InteractionError>;
}

/// Select among `candidates` and return the chosen candidate.
pub fn choose(
    provider: &dyn InputProvider,
    label: &str,
    mut candidates: Vec<Value>,
) -> Result<Value, InteractionError> {
    if candidates.is_empty() {
        return Err(InteractionError::NoCandidates(label.to_string()));
    }
    let len = candidates.len();
    let index = provider.select(label, &candidates)?;
    if index >= len {
        return Err(InteractionError::OutOfRange { index, len });
    }
    Ok(candidates.swap_remove(index))
}

/// Check `text` against an optional pattern, describing the requirement on mismatch.
pub fn check(validator: Option<&Regex>, text: &str) -> Result<(), String> {
    match validator {
        Some(regex) if !regex.is_match(text) => Err(format!(
            "invalid value (required pattern: {})",
            regex.as_str()
        )),
        _ => Ok(()),
    }
}

/// Plain-text rendering of a value: strings verbatim, null empty, anything else as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn choose_returns_candidate_at_index() {
        let input = ScriptedInput::with_answers(vec![Answer::Choose(1)]);
        let chosen = choose(&input, "size", vec![json!(10), json!(20), json!(30)]).unwrap();
        assert_eq!(chosen, json!(20));
    }

    #[test]
    fn choose_rejects_empty_list() {
        let input = ScriptedInput::new();
        let err = choose(&input, "size", vec![]).unwrap_err();
        assert!(matches!(err, InteractionError::NoCandidates(label) if label == "size"));
        assert!(input.requests().is_empty());
    }

    #[test]
    fn choose_rejects_out_of_range_index() {
        let input = ScriptedInput::with_answers(vec![Answer::Choose(5)]);
        let err = choose(&input, "size", vec![json!(1)]).unwrap_err();
        assert!(matches!(err, InteractionError::OutOfRange { index: 5, len: 1 }));
    }

    #[test]
    fn check_describes_pattern() {
        let regex = Regex::new("^[a-z]+$").unwrap();
        assert!(check(Some(&regex), "alice").is_ok());
        assert_eq!(
            check(Some(&regex), "Alice").unwrap_err(),
            "invalid value (required pattern: ^[a-z]+$)"
        );
        assert!(check(None, "anything").is_ok());
    }

    #[test]
    fn to_text_formats_values() {
        assert_eq!(to_text(&json!("plain")), "plain");
        assert_eq!(to_text(&Value::Null), "");
        assert_eq!(to_text(&json!(20)), "20");
        assert_eq!(to_text(&json!([1, "a"])), r#"[1,"a"]"#);
    }
}
