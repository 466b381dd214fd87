//! Decoding of JSON-encoded method parameters into an argument list.

use serde_json::Value;

use crate::error::DecodeError;

/// Decode a parameter string leniently.
///
/// - empty or whitespace -> no arguments
/// - a JSON array -> its elements, in order
/// - any other JSON value -> a single argument
/// - invalid JSON -> no arguments (logged, not surfaced)
pub fn decode(params: &str) -> Vec<Value> {
    match try_decode(params) {
        Ok(args) => args,
        Err(e) => {
            tracing::warn!(error = %e, "Parameters are not valid JSON, invoking with no arguments");
            Vec::new()
        }
    }
}

/// Strict variant of [`decode`] that reports invalid JSON.
pub fn try_decode(params: &str) -> Result<Vec<Value>, DecodeError> {
    if params.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(params)? {
        Value::Array(args) => Ok(args),
        value => Ok(vec![value]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_is_no_arguments() {
        assert!(decode("").is_empty());
        assert!(decode("   ").is_empty());
    }

    #[test]
    fn array_is_used_as_is() {
        assert_eq!(decode("[1,2]"), vec![json!(1), json!(2)]);
        assert_eq!(decode("[]"), Vec::<Value>::new());
    }

    #[test]
    fn object_is_wrapped() {
        assert_eq!(decode(r#"{"a":1}"#), vec![json!({"a": 1})]);
    }

    #[test]
    fn scalar_is_wrapped() {
        assert_eq!(decode(r#""checked in""#), vec![json!("checked in")]);
        assert_eq!(decode("5"), vec![json!(5)]);
        assert_eq!(decode("null"), vec![Value::Null]);
    }

    #[test]
    fn invalid_json_is_no_arguments() {
        assert!(decode("not json").is_empty());
        assert!(try_decode("not json").is_err());
    }
}
