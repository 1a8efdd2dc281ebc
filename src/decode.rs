//! YAML decoding into template values

use serde_json::{Map, Number};
use serde_yaml::Value as Yaml;
use tera::Value;

use crate::error::DecodeError;

/// Decode YAML text into a scalar, sequence or mapping.
///
/// Mapping keys are always strings in the template value space, so scalar keys are
/// stringified. Tags are dropped and their inner value kept.
///
/// Scalars resolve with the YAML 1.2 core schema: only `true`/`false` are booleans, so
/// `yes`, `no`, `on` and `off` stay strings.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    let doc: Yaml = serde_yaml::from_str(text).map_err(DecodeError::Syntax)?;
    to_value(doc)
}

fn to_value(yaml: Yaml) -> Result<Value, DecodeError> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => Value::Number(number(&n)?),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(key_string(key)?, to_value(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => to_value(tagged.value)?,
    })
}

fn number(n: &serde_yaml::Number) -> Result<Number, DecodeError> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    Number::from_f64(f).ok_or(DecodeError::NonFinite(f))
}

fn key_string(key: Yaml) -> Result<String, DecodeError> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => key_string(tagged.value),
        other => Err(DecodeError::UnsupportedKey(
            serde_yaml::to_string(&other)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "<unprintable>".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode("42").unwrap(), json!(42));
        assert_eq!(decode("-7").unwrap(), json!(-7));
        assert_eq!(decode("2.5").unwrap(), json!(2.5));
        assert_eq!(decode("true").unwrap(), json!(true));
        assert_eq!(decode("~").unwrap(), Value::Null);
        assert_eq!(decode("hello").unwrap(), json!("hello"));
    }

    #[test]
    fn decodes_nested_document() {
        let doc = "name: quill\ntags: [cli, template]\nowner:\n  id: 7\n  active: yes\n";
        let value = decode(doc).unwrap();
        assert_eq!(value["name"], json!("quill"));
        assert_eq!(value["tags"], json!(["cli", "template"]));
        assert_eq!(value["owner"]["id"], json!(7));
        assert_eq!(value["owner"]["active"], json!("yes"));
    }

    #[test]
    fn only_true_and_false_are_booleans() {
        let value = decode("a: yes\nb: off\nc: true\nd: false\n").unwrap();
        assert_eq!(value, json!({"a": "yes", "b": "off", "c": true, "d": false}));
    }

    #[test]
    fn stringifies_scalar_keys() {
        let value = decode("1: one\ntrue: yes-key\n").unwrap();
        assert_eq!(value["1"], json!("one"));
        assert_eq!(value["true"], json!("yes-key"));
    }

    #[test]
    fn unwraps_tags() {
        assert_eq!(decode("!port 8080").unwrap(), json!(8080));
    }

    #[test]
    fn rejects_non_finite_numbers() {
        let err = decode(".nan").unwrap_err();
        assert!(matches!(err, DecodeError::NonFinite(_)));
    }

    #[test]
    fn rejects_sequence_keys() {
        let err = decode("? [a, b]\n: value\n").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedKey(_)));
    }

    #[test]
    fn malformed_input_names_the_decode_step() {
        let err = decode("key: [unclosed").unwrap_err();
        assert!(err.to_string().starts_with("yaml: failed to decode"));
    }

    #[test]
    fn value_model_survives_reencoding() {
        let values = [
            json!("text"),
            json!(12),
            json!(-3.25),
            json!(false),
            Value::Null,
            json!(["a", 1, null, [true]]),
            json!({"k": {"nested": [1, 2]}, "empty": {}}),
        ];
        for value in values {
            let text = serde_yaml::to_string(&value).unwrap();
            assert_eq!(decode(&text).unwrap(), value, "round trip of {text}");
        }
    }
}
