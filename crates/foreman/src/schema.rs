//! Rich tool-parameter schemas.
//!
//! A [`ToolSchema`] is the validating form of a tool's parameters; the agent
//! loop serializes it to the wire JSON-Schema form once per run and validates
//! the LLM-provided argument map against it before every execution.

use std::fmt;

use serde_json::{Map, Value, json};

/// The JSON type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            // Accept zero-fraction floats: models frequently send `3.0` for ints.
            Self::Integer => {
                value.as_i64().is_some()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    kind: ParamKind,
    description: String,
    required: bool,
}

/// Schema for a tool's argument object.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    properties: Vec<Property>,
}

impl ToolSchema {
    /// An object schema with no parameters.
    pub fn object() -> Self {
        Self::default()
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.properties.push(Property {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        });
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.properties.push(Property {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        });
        self
    }

    /// Serialize to the wire JSON-Schema form sent to the LLM.
    pub fn to_wire(&self) -> Value {
        let mut props = Map::new();
        let mut required = Vec::new();
        for p in &self.properties {
            props.insert(
                p.name.clone(),
                json!({"type": p.kind.type_name(), "description": p.description}),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": props,
            "required": required,
        })
    }

    /// Validate an untyped argument map against this schema.
    ///
    /// Unknown keys are allowed and passed through. `null` counts as absent.
    pub fn validate(&self, input: &Value) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let Some(map) = input.as_object() else {
            issues.push(Issue {
                path: "(arguments)".into(),
                message: "expected a JSON object".into(),
            });
            return Err(ValidationError { issues });
        };

        for p in &self.properties {
            match map.get(&p.name) {
                None | Some(Value::Null) => {
                    if p.required {
                        issues.push(Issue {
                            path: p.name.clone(),
                            message: "required field is missing".into(),
                        });
                    }
                }
                Some(value) => {
                    if !p.kind.matches(value) {
                        issues.push(Issue {
                            path: p.name.clone(),
                            message: format!("expected {}", p.kind.type_name()),
                        });
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// One (field path, message) pair from a failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

/// Structured validation failure. Displays as `field: message, field: message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", issue.path, issue.message)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ToolSchema {
        ToolSchema::object()
            .required("path", ParamKind::String, "File path")
            .optional("limit", ParamKind::Integer, "Line limit")
    }

    #[test]
    fn wire_form_has_properties_and_required() {
        let wire = sample_schema().to_wire();
        assert_eq!(wire["type"], "object");
        assert_eq!(wire["properties"]["path"]["type"], "string");
        assert_eq!(wire["properties"]["limit"]["type"], "integer");
        assert_eq!(wire["required"], json!(["path"]));
    }

    #[test]
    fn validate_accepts_well_typed_input() {
        let schema = sample_schema();
        assert!(schema.validate(&json!({"path": "/tmp/x", "limit": 10})).is_ok());
        assert!(schema.validate(&json!({"path": "/tmp/x"})).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let err = sample_schema().validate(&json!({})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "path");
        assert_eq!(err.to_string(), "path: required field is missing");
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let err = sample_schema()
            .validate(&json!({"path": 123}))
            .unwrap_err();
        assert_eq!(err.to_string(), "path: expected string");
    }

    #[test]
    fn validate_collects_multiple_issues() {
        let err = sample_schema()
            .validate(&json!({"path": 1, "limit": "ten"}))
            .unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(
            err.to_string(),
            "path: expected string, limit: expected integer"
        );
    }

    #[test]
    fn validate_rejects_non_object() {
        let err = sample_schema().validate(&json!("nope")).unwrap_err();
        assert_eq!(err.issues[0].path, "(arguments)");
    }

    #[test]
    fn integer_accepts_zero_fraction_float() {
        let schema = ToolSchema::object().required("n", ParamKind::Integer, "count");
        assert!(schema.validate(&json!({"n": 3.0})).is_ok());
        assert!(schema.validate(&json!({"n": 3.5})).is_err());
    }

    #[test]
    fn null_counts_as_absent() {
        let schema = sample_schema();
        assert!(schema.validate(&json!({"path": "/x", "limit": null})).is_ok());
        assert!(schema.validate(&json!({"path": null})).is_err());
    }

    #[test]
    fn unknown_keys_pass_through() {
        let schema = sample_schema();
        assert!(
            schema
                .validate(&json!({"path": "/x", "extra": true}))
                .is_ok()
        );
    }
}
