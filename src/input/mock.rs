//! Scripted input for testing
//!
//! Replays queued answers instead of reading a terminal and records every request,
//! so renders with prompts and selections are deterministic.

use std::collections::VecDeque;
use std::sync::Mutex;

use regex::Regex;
use tera::Value;

use super::{check, InputProvider};
use crate::error::InteractionError;

/// One queued operator response.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Keep the prompt's default unchanged
    Accept,
    /// Replace the prompt's text
    Text(String),
    /// Pick the candidate at this index
    Choose(usize),
}

/// A recorded interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Prompt {
        label: String,
        default: String,
        pattern: Option<String>,
    },
    Select {
        label: String,
        candidates: Vec<Value>,
    },
}

/// Input provider that answers from a FIFO queue
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: Mutex<VecDeque<Answer>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedInput {
    /// Provider with no answers: every interaction fails as a closed stream
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add an answer to the queue
    pub fn queue(&self, answer: Answer) {
        self.answers.lock().unwrap().push_back(answer);
    }

    /// All interactions so far, in order
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    fn next(&self) -> Result<Answer, InteractionError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(InteractionError::Closed)
    }
}

impl InputProvider for ScriptedInput {
    fn prompt(
        &self,
        label: &str,
        default: &str,
        validator: Option<&Regex>,
    ) -> Result<String, InteractionError> {
        self.requests.lock().unwrap().push(Request::Prompt {
            label: label.to_string(),
            default: default.to_string(),
            pattern: validator.map(|r| r.as_str().to_string()),
        });

        // Rejected answers consume the next one, like an operator retrying
        loop {
            let text = match self.next()? {
                Answer::Accept => default.to_string(),
                Answer::Text(text) => text,
                Answer::Choose(i) => {
                    return Err(InteractionError::Scripted(format!(
                        "choice {i} given to prompt '{label}'"
                    )))
                }
            };
            if check(validator, &text).is_ok() {
                return Ok(text);
            }
        }
    }

    fn select(&self, label: &str, candidates: &[Value]) -> Result<usize, InteractionError> {
        self.requests.lock().unwrap().push(Request::Select {
            label: label.to_string(),
            candidates: candidates.to_vec(),
        });

        match self.next()? {
            Answer::Choose(i) => Ok(i),
            other => Err(InteractionError::Scripted(format!(
                "{other:?} given to selection '{label}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accept_returns_default() {
        let input = ScriptedInput::with_answers(vec![Answer::Accept]);
        assert_eq!(input.prompt("name", "alice", None).unwrap(), "alice");
        assert_eq!(
            input.requests(),
            vec![Request::Prompt {
                label: "name".into(),
                default: "alice".into(),
                pattern: None,
            }]
        );
    }

    #[test]
    fn invalid_answer_is_retried() {
        let input = ScriptedInput::with_answers(vec![
            Answer::Text("Bob!".into()),
            Answer::Text("bob".into()),
        ]);
        let regex = Regex::new("^[a-z]+$").unwrap();
        assert_eq!(input.prompt("name", "", Some(&regex)).unwrap(), "bob");
        assert_eq!(input.remaining(), 0);
        assert_eq!(input.requests().len(), 1);
    }

    #[test]
    fn exhausted_queue_is_a_closed_stream() {
        let input = ScriptedInput::new();
        let err = input.prompt("name", "x", None).unwrap_err();
        assert!(matches!(err, InteractionError::Closed));
    }

    #[test]
    fn select_records_candidates() {
        let input = ScriptedInput::new();
        input.queue(Answer::Choose(0));
        assert_eq!(input.select("pick", &[json!("a")]).unwrap(), 0);
        assert_eq!(
            input.requests(),
            vec![Request::Select {
                label: "pick".into(),
                candidates: vec![json!("a")],
            }]
        );
    }

    #[test]
    fn mismatched_answer_kind_fails() {
        let input = ScriptedInput::with_answers(vec![Answer::Accept]);
        let err = input.select("pick", &[json!(1)]).unwrap_err();
        assert!(matches!(err, InteractionError::Scripted(_)));
    }
}
