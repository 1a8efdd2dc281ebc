//! Built-in statement tags: `ask` and `choose`

use std::sync::Arc;

use tera::Value;

use super::markup::{AssignmentStatement, ChoiceStatement};
use super::{StatementTag, TagHandler};
use crate::error::{QuillError, TagSyntaxError};
use crate::input::{choose, to_text, InputProvider};

/// `{% ask var [matching "re"] = default %}`
pub struct AskTag {
    input: Arc<dyn InputProvider>,
}

impl AskTag {
    pub fn new(input: Arc<dyn InputProvider>) -> Self {
        Self { input }
    }
}

impl StatementTag for AskTag {
    fn parse(&self, markup: &str) -> Result<Box<dyn TagHandler>, TagSyntaxError> {
        let statement = AssignmentStatement::parse(markup)?;
        Ok(Box::new(AskHandler {
            expressions: vec![statement.default.clone()],
            statement,
            input: Arc::clone(&self.input),
        }))
    }
}

struct AskHandler {
    statement: AssignmentStatement,
    expressions: Vec<String>,
    input: Arc<dyn InputProvider>,
}

impl TagHandler for AskHandler {
    fn target(&self) -> &str {
        &self.statement.target
    }

    fn expressions(&self) -> &[String] {
        &self.expressions
    }

    fn render(&self, values: Vec<Value>) -> Result<Value, QuillError> {
        let default = values.first().map(to_text).unwrap_or_default();
        let answer = self.input.prompt(
            &self.statement.target,
            &default,
            self.statement.pattern.as_ref(),
        )?;
        Ok(Value::String(answer))
    }
}

/// `{% choose var = a, b, c %}`
pub struct ChooseTag {
    input: Arc<dyn InputProvider>,
}

impl ChooseTag {
    pub fn new(input: Arc<dyn InputProvider>) -> Self {
        Self { input }
    }
}

impl StatementTag for ChooseTag {
    fn parse(&self, markup: &str) -> Result<Box<dyn TagHandler>, TagSyntaxError> {
        let statement = ChoiceStatement::parse(markup)?;
        Ok(Box::new(ChooseHandler {
            statement,
            input: Arc::clone(&self.input),
        }))
    }
}

struct ChooseHandler {
    statement: ChoiceStatement,
    input: Arc<dyn InputProvider>,
}

impl TagHandler for ChooseHandler {
    fn target(&self) -> &str {
        &self.statement.target
    }

    fn expressions(&self) -> &[String] {
        &self.statement.candidates
    }

    fn render(&self, values: Vec<Value>) -> Result<Value, QuillError> {
        Ok(choose(self.input.as_ref(), &self.statement.target, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Answer, Request, ScriptedInput};
    use serde_json::json;

    #[test]
    fn ask_prompts_with_evaluated_default() {
        let input = Arc::new(ScriptedInput::with_answers(vec![Answer::Accept]));
        let handler = AskTag::new(input.clone()).parse(r#"who = user.name"#).unwrap();

        assert_eq!(handler.target(), "who");
        assert_eq!(handler.expressions(), ["user.name".to_string()]);
        assert_eq!(handler.render(vec![json!("alice")]).unwrap(), json!("alice"));
        assert_eq!(
            input.requests(),
            vec![Request::Prompt {
                label: "who".into(),
                default: "alice".into(),
                pattern: None,
            }]
        );
    }

    #[test]
    fn ask_passes_compiled_pattern() {
        let input = Arc::new(ScriptedInput::with_answers(vec![
            Answer::Text("x1".into()),
            Answer::Text("42".into()),
        ]));
        let handler = AskTag::new(input.clone())
            .parse(r#"port matching "^[0-9]+$" = 8080"#)
            .unwrap();
        assert_eq!(handler.render(vec![json!(8080)]).unwrap(), json!("42"));
    }

    #[test]
    fn ask_rejects_bad_pattern_at_parse_time() {
        let input = Arc::new(ScriptedInput::new());
        let err = AskTag::new(input.clone())
            .parse(r#"x matching "[" = 1"#)
            .err()
            .unwrap();
        assert!(matches!(err, TagSyntaxError::InvalidPattern { .. }));
        assert!(input.requests().is_empty());
    }

    #[test]
    fn choose_returns_chosen_candidate() {
        let input = Arc::new(ScriptedInput::with_answers(vec![Answer::Choose(1)]));
        let handler = ChooseTag::new(input.clone()).parse("size = 10, 20, 30").unwrap();

        assert_eq!(handler.expressions().len(), 3);
        let chosen = handler
            .render(vec![json!(10), json!(20), json!(30)])
            .unwrap();
        assert_eq!(chosen, json!(20));
    }
}
