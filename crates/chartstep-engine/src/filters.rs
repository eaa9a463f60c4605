//! Filters for rendering pipeline values into values files

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};

fn invalid(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(invalid)
}

/// Scalars print their content, everything else its template representation
fn as_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Serialize a value as a YAML fragment
///
/// Usage: `{{ cpe["custom/buildSettings"] | toyaml | nindent(2) }}`
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(invalid)?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Serialize a value as compact JSON
///
/// Usage: `images: {{ cpe["container/imageNames"] | tojson }}`
pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(invalid)
}

/// Usage: `{{ cpe["custom/token"] | b64encode }}`
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Wrap in double quotes, escaping backslashes and quotes
pub fn quote(value: Value) -> String {
    let text = as_text(&value);
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Wrap in single quotes, YAML style
pub fn squote(value: Value) -> String {
    format!("'{}'", as_text(&value).replace('\'', "''"))
}

/// Indent every non-empty line by `spaces`
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like `indent`, prefixed with a newline
///
/// Usage: `settings: {{ cpe["custom/buildSettings"] | toyaml | nindent(2) }}`
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Fail the render when a value is absent or empty
///
/// Usage: `tag: {{ cpe.artifactVersion | required("artifactVersion was not set by the build") }}`
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);

    if missing {
        Err(Error::new(
            ErrorKind::InvalidOperation,
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

fn is_empty_value(value: &Value) -> bool {
    value.is_undefined() || value.is_none()
}

/// First item of a sequence or first character of a string; empty for absent keys
///
/// Usage: `image: {{ cpe["container/imageNames"] | first }}`
pub fn first(value: &Value) -> Result<Value, Error> {
    if is_empty_value(value) {
        return Ok(Value::UNDEFINED);
    }
    if let Some(s) = value.as_str() {
        return Ok(s.chars().next().map(Value::from).unwrap_or(Value::UNDEFINED));
    }
    Ok(value.try_iter()?.next().unwrap_or(Value::UNDEFINED))
}

pub fn last(value: &Value) -> Result<Value, Error> {
    if is_empty_value(value) {
        return Ok(Value::UNDEFINED);
    }
    if let Some(s) = value.as_str() {
        return Ok(s.chars().next_back().map(Value::from).unwrap_or(Value::UNDEFINED));
    }
    Ok(value.try_iter()?.last().unwrap_or(Value::UNDEFINED))
}

/// Number of items; zero for absent keys
pub fn length(value: &Value) -> Result<usize, Error> {
    if is_empty_value(value) {
        return Ok(0);
    }
    value.len().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot calculate length of value of type {}", value.kind()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml() {
        let value = Value::from_serialize(serde_json::json!({"tool": "maven"}));
        assert_eq!(toyaml(value).unwrap(), "tool: maven");
    }

    #[test]
    fn test_tojson_list() {
        let value = Value::from_serialize(vec!["app", "sidecar"]);
        assert_eq!(tojson(value).unwrap(), r#"["app","sidecar"]"#);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(Value::from(r#"say "hi""#)), r#""say \"hi\"""#);
        assert_eq!(squote(Value::from("it's")), "'it''s'");
    }

    #[test]
    fn test_b64encode() {
        assert_eq!(b64encode("hello".to_string()), "aGVsbG8=");
    }

    #[test]
    fn test_indent_and_nindent() {
        assert_eq!(indent("a\nb".to_string(), 2), "  a\n  b");
        assert_eq!(nindent("a\n\nb".to_string(), 2), "\n  a\n\n  b");
    }

    #[test]
    fn test_sequence_filters_on_absent_value() {
        assert!(first(&Value::UNDEFINED).unwrap().is_undefined());
        assert!(last(&Value::UNDEFINED).unwrap().is_undefined());
        assert_eq!(length(&Value::UNDEFINED).unwrap(), 0);
        assert_eq!(length(&Value::from(())).unwrap(), 0);
    }

    #[test]
    fn test_sequence_filters() {
        let images = Value::from_serialize(vec!["app", "sidecar"]);
        assert_eq!(first(&images).unwrap(), Value::from("app"));
        assert_eq!(last(&images).unwrap(), Value::from("sidecar"));
        assert_eq!(length(&images).unwrap(), 2);
        assert_eq!(first(&Value::from("v1")).unwrap(), Value::from("v"));
        assert_eq!(length(&Value::from("v1")).unwrap(), 2);
        assert!(length(&Value::from(3)).is_err());
    }

    #[test]
    fn test_required() {
        assert!(required(Value::from("x"), None).is_ok());
        assert!(required(Value::from(""), None).is_err());

        let err = required(Value::UNDEFINED, Some("need it".into())).unwrap_err();
        assert!(err.to_string().contains("need it"));
    }
}
