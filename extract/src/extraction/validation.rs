//! Schema validation and parsing of structured model output.

use serde_json::Value;
use std::fmt;

use super::error::ExtractionError;

/// Characters of unparseable model output kept on a [`ExtractionError::ParseError`].
const RAW_TEXT_PREVIEW_CHARS: usize = 500;

/// Collect all validation errors from jsonschema validation.
///
/// Returns a vector of formatted error strings with instance paths.
/// Uses `iter_errors()` to collect ALL validation failures, not just the first.
///
/// # Examples
///
/// ```
/// use docimport_extract::extraction::validation::collect_validation_errors;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "properties": {
///         "name": {"type": "string"},
///         "age": {"type": "integer", "minimum": 0}
///     },
///     "required": ["name", "age"]
/// });
///
/// let instance = json!({"age": -5});
/// let errors = collect_validation_errors(&schema, &instance);
/// assert!(!errors.is_empty());
/// ```
#[must_use]
pub fn collect_validation_errors(schema: &Value, instance: &Value) -> Vec<String> {
    match CompiledSchema::compile(schema) {
        Ok(compiled) => compiled.errors(instance),
        Err(e) => vec![format!("Schema compilation error: {e}")],
    }
}

/// A target schema paired with its compiled validator.
///
/// Compile once per extraction and share it across attempts.
pub struct CompiledSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl CompiledSchema {
    /// Compiles `schema`.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::SchemaError` if the schema is not a valid JSON Schema.
    pub fn compile(schema: &Value) -> Result<Self, ExtractionError> {
        let validator = jsonschema::Validator::new(schema)
            .map_err(|e| ExtractionError::SchemaError(e.to_string()))?;
        Ok(Self {
            schema: schema.clone(),
            validator,
        })
    }

    /// The schema document.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.schema
    }

    /// Every validation failure of `instance`, with instance paths.
    #[must_use]
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|error| format!("At path '{}': {}", error.instance_path, error))
            .collect()
    }

    /// Turns the provider's raw result into a validated object.
    ///
    /// `None` and JSON `null` both count as an empty response.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::EmptyResponse` when there is no object and
    /// `ExtractionError::Validation` when the object does not match.
    pub fn validate(&self, output: Option<Value>) -> Result<Value, ExtractionError> {
        let value = match output {
            None | Some(Value::Null) => return Err(ExtractionError::EmptyResponse),
            Some(value) => value,
        };

        let errors = self.errors(&value);
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(ExtractionError::Validation { errors })
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Parses a model's text reply into JSON.
///
/// Whitespace-only replies yield `Ok(None)`. A surrounding Markdown code fence
/// (with or without a `json` language tag) is stripped before parsing.
///
/// # Examples
///
/// ```
/// use docimport_extract::extraction::validation::parse_structured_output;
///
/// let value = parse_structured_output("```json\n{\"a\": 1}\n```").unwrap();
/// assert_eq!(value.unwrap()["a"], 1);
/// assert!(parse_structured_output("   ").unwrap().is_none());
/// ```
///
/// # Errors
///
/// Returns `ExtractionError::ParseError` if the reply is not valid JSON.
pub fn parse_structured_output(raw: &str) -> Result<Option<Value>, ExtractionError> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Value>(trimmed)
        .map(Some)
        .map_err(|e| ExtractionError::ParseError {
            message: e.to_string(),
            raw_text: raw.chars().take(RAW_TEXT_PREVIEW_CHARS).collect(),
        })
}

/// Builds the instruction that pins a model's reply to `schema`.
#[must_use]
pub fn build_schema_instruction(schema: &Value) -> String {
    let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Respond with a single JSON object and nothing else. \
         The object must conform to this JSON Schema:\n{schema_str}"
    )
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the optional language tag on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name", "age"]
        })
    }

    #[test]
    fn test_collect_validation_errors() {
        let instance = json!({"age": -5});
        let errors = collect_validation_errors(&person_schema(), &instance);

        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.contains("name")));
    }

    #[test]
    fn test_compile_rejects_bad_schema() {
        let schema = json!({"type": "not-a-type"});
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(ExtractionError::SchemaError(_))
        ));
        assert!(CompiledSchema::compile(&person_schema()).is_ok());
    }

    #[test]
    fn test_validate_empty() {
        let compiled = CompiledSchema::compile(&person_schema()).unwrap();
        assert!(matches!(compiled.validate(None), Err(ExtractionError::EmptyResponse)));
        assert!(matches!(
            compiled.validate(Some(Value::Null)),
            Err(ExtractionError::EmptyResponse)
        ));
    }

    #[test]
    fn test_validate_invalid_and_valid() {
        let compiled = CompiledSchema::compile(&person_schema()).unwrap();
        let err = compiled.validate(Some(json!({"name": 3}))).unwrap_err();
        match err {
            ExtractionError::Validation { errors } => assert!(!errors.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }

        let value = json!({"name": "Ada", "age": 36});
        assert_eq!(compiled.validate(Some(value.clone())).unwrap(), value);
        assert_eq!(compiled.as_value(), &person_schema());
    }

    #[test]
    fn test_parse_structured_output_plain_and_fenced() {
        let plain = parse_structured_output(r#"{"a": 1}"#).unwrap().unwrap();
        assert_eq!(plain, json!({"a": 1}));

        let fenced = parse_structured_output("```json\n{\"a\": 2}\n```").unwrap().unwrap();
        assert_eq!(fenced, json!({"a": 2}));

        let bare_fence = parse_structured_output("```\n[1, 2]\n```").unwrap().unwrap();
        assert_eq!(bare_fence, json!([1, 2]));
    }

    #[test]
    fn test_parse_structured_output_errors_keep_preview() {
        let raw = "x".repeat(1000);
        match parse_structured_output(&raw) {
            Err(ExtractionError::ParseError { raw_text, .. }) => {
                assert_eq!(raw_text.chars().count(), RAW_TEXT_PREVIEW_CHARS);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_build_schema_instruction() {
        let instruction = build_schema_instruction(&person_schema());
        assert!(instruction.contains("JSON Schema"));
        assert!(instruction.contains("\"required\""));
    }
}
