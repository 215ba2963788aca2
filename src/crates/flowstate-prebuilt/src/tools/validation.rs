//! Argument validation against a tool's parameter schema
//!
//! Models produce tool arguments as free-form JSON, so they are checked
//! against the tool's JSON schema before the tool runs. Every violation is
//! reported, prefixed with the JSON pointer of the offending value:
//!
//! ```rust
//! use flowstate_prebuilt::tools::validate_arguments;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"limit": {"type": "integer", "minimum": 1}},
//!     "required": ["limit"]
//! });
//! assert!(validate_arguments("search", &schema, &json!({"limit": 3})).is_ok());
//! assert!(validate_arguments("search", &schema, &json!({"limit": 0})).is_err());
//! ```

use crate::error::{AgentError, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Check `args` against `schema`, reporting every violation
pub fn validate_arguments(tool: &str, schema: &Value, args: &Value) -> Result<()> {
    if !args.is_object() {
        return Err(AgentError::invalid_arguments(tool, "arguments must be a JSON object"));
    }

    let compiled = JSONSchema::compile(schema)
        .map_err(|e| AgentError::invalid_arguments(tool, format!("invalid parameter schema: {}", e)))?;

    let violations: Vec<String> = match compiled.validate(args) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    };

    Err(AgentError::invalid_arguments(tool, violations.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1},
                "scope": {"type": "string", "enum": ["web", "docs"]},
                "lang": {"type": "string", "pattern": "^[a-z]{2}$"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "filter": {"type": "object", "required": ["field"]}
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn reason(err: AgentError) -> String {
        match err {
            AgentError::InvalidToolArguments { reason, .. } => reason,
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_accepts_valid_arguments() {
        let args = json!({
            "query": "rust",
            "limit": 3,
            "scope": "docs",
            "lang": "en",
            "tags": ["a", "b"],
            "filter": {"field": "title"}
        });
        assert!(validate_arguments("search", &search_schema(), &args).is_ok());
    }

    #[test]
    fn test_integral_float_is_an_integer() {
        let args = json!({"query": "rust", "limit": 3.0});
        assert!(validate_arguments("search", &search_schema(), &args).is_ok());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = validate_arguments("search", &search_schema(), &json!("rust")).unwrap_err();
        assert_eq!(reason(err), "arguments must be a JSON object");
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate_arguments("search", &search_schema(), &json!({"limit": 1})).unwrap_err();
        assert!(reason(err).contains("\"query\""));
    }

    #[test]
    fn test_reports_nested_and_bound_violations() {
        let args = json!({"query": "x", "limit": 0, "tags": [1, 2], "filter": {}, "extra": true});
        let reason = reason(validate_arguments("search", &search_schema(), &args).unwrap_err());

        assert!(reason.contains("/limit"), "{}", reason);
        assert!(reason.contains("/tags/0"), "{}", reason);
        assert!(reason.contains("/tags/1"), "{}", reason);
        assert!(reason.contains("/filter"), "{}", reason);
        assert!(reason.contains("extra"), "{}", reason);
    }

    #[test]
    fn test_type_enum_and_pattern() {
        let schema = search_schema();

        let err = validate_arguments("search", &schema, &json!({"query": "x", "limit": 1.5})).unwrap_err();
        assert!(reason(err).starts_with("/limit: "));

        let err = validate_arguments("search", &schema, &json!({"query": "x", "scope": "mail"})).unwrap_err();
        assert!(reason(err).starts_with("/scope: "));

        let err = validate_arguments("search", &schema, &json!({"query": "x", "lang": "english"})).unwrap_err();
        assert!(reason(err).starts_with("/lang: "));
    }

    #[test]
    fn test_invalid_schema_is_reported() {
        let err = validate_arguments("broken", &json!({"type": 12}), &json!({})).unwrap_err();
        assert!(reason(err).starts_with("invalid parameter schema"));
    }

    #[test]
    fn test_schema_without_properties() {
        assert!(validate_arguments("any", &json!({"type": "object"}), &json!({"x": 1})).is_ok());
    }
}
