//! Structural parameter schemas and their validator.
//!
//! A deliberately small subset of JSON Schema: typed properties, required
//! fields, enums, numeric ranges, string lengths, arrays with item
//! schemas, and nested objects. Undeclared properties are **always**
//! rejected — there is no way to opt out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The value types a property may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// Schema for a single property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,

    #[serde(default)]
    pub description: String,

    /// Closed set of permitted values (any type).
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Inclusive numeric bounds (integer and number types).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// String length bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Item schema for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,

    /// Nested properties for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertySchema>>,

    /// Required keys of a nested object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            description: String::new(),
            enum_values: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            items: None,
            properties: None,
            required: None,
        }
    }
}

/// Top-level parameter schema of one tool: always an object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,

    #[serde(default)]
    pub required: Vec<String>,
}

/// One reason a set of arguments was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Dotted path to the offending value ("" for the root).
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl ParamSchema {
    /// Validate arguments against this schema.
    ///
    /// Collects every violation rather than stopping at the first, so the
    /// calling agent gets one complete rejection to correct against.
    pub fn validate(&self, args: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();

        let Some(obj) = args.as_object() else {
            violations.push(SchemaViolation {
                path: String::new(),
                message: format!("arguments must be an object, got {}", type_name(args)),
            });
            return Err(violations);
        };

        check_object(obj, &self.properties, &self.required, "", &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_object(
    obj: &serde_json::Map<String, Value>,
    properties: &BTreeMap<String, PropertySchema>,
    required: &[String],
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    for name in required {
        if !obj.contains_key(name) {
            violations.push(SchemaViolation {
                path: join(path, name),
                message: "required field is missing".into(),
            });
        }
    }

    for (key, value) in obj {
        match properties.get(key) {
            Some(prop) => check_value(value, prop, &join(path, key), violations),
            None => violations.push(SchemaViolation {
                path: join(path, key),
                message: "undeclared field".into(),
            }),
        }
    }
}

fn check_value(value: &Value, prop: &PropertySchema, path: &str, violations: &mut Vec<SchemaViolation>) {
    let matches_type = match prop.kind {
        SchemaType::String => value.is_string(),
        SchemaType::Integer => value.is_i64() || value.is_u64(),
        SchemaType::Number => value.is_number(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Array => value.is_array(),
        SchemaType::Object => value.is_object(),
    };
    if !matches_type {
        violations.push(SchemaViolation {
            path: path.to_string(),
            message: format!("expected {}, got {}", prop.kind, type_name(value)),
        });
        return;
    }

    if let Some(allowed) = &prop.enum_values {
        if !allowed.contains(value) {
            violations.push(SchemaViolation {
                path: path.to_string(),
                message: format!("value not in permitted set ({} options)", allowed.len()),
            });
            return;
        }
    }

    match prop.kind {
        SchemaType::Integer | SchemaType::Number => {
            if let Some(n) = value.as_f64() {
                if let Some(min) = prop.minimum {
                    if n < min {
                        violations.push(SchemaViolation {
                            path: path.to_string(),
                            message: format!("{n} is below minimum {min}"),
                        });
                    }
                }
                if let Some(max) = prop.maximum {
                    if n > max {
                        violations.push(SchemaViolation {
                            path: path.to_string(),
                            message: format!("{n} is above maximum {max}"),
                        });
                    }
                }
            }
        }
        SchemaType::String => {
            if let Some(s) = value.as_str() {
                if let Some(min) = prop.min_length {
                    if s.chars().count() < min {
                        violations.push(SchemaViolation {
                            path: path.to_string(),
                            message: format!("shorter than minimum length {min}"),
                        });
                    }
                }
                if let Some(max) = prop.max_length {
                    if s.chars().count() > max {
                        violations.push(SchemaViolation {
                            path: path.to_string(),
                            message: format!("longer than maximum length {max}"),
                        });
                    }
                }
            }
        }
        SchemaType::Array => {
            if let (Some(items), Some(arr)) = (&prop.items, value.as_array()) {
                for (i, item) in arr.iter().enumerate() {
                    check_value(item, items, &format!("{path}[{i}]"), violations);
                }
            }
        }
        SchemaType::Object => {
            if let Some(obj) = value.as_object() {
                let empty = BTreeMap::new();
                let nested_props = prop.properties.as_ref().unwrap_or(&empty);
                let nested_required: &[String] =
                    prop.required.as_deref().unwrap_or_default();
                check_object(obj, nested_props, nested_required, path, violations);
            }
        }
        SchemaType::Boolean => {}
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> ParamSchema {
        serde_json::from_value(json!({
            "properties": {
                "query": { "type": "string", "min_length": 1 },
                "limit": { "type": "integer", "minimum": 1, "maximum": 50 },
                "safe": { "type": "boolean" },
                "sort": { "type": "string", "enum": ["relevance", "date"] },
                "filters": {
                    "type": "object",
                    "properties": {
                        "site": { "type": "string" }
                    },
                    "required": ["site"]
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["query"]
        }))
        .unwrap()
    }

    #[test]
    fn valid_arguments_pass() {
        let schema = search_schema();
        let args = json!({
            "query": "rust workspaces",
            "limit": 10,
            "safe": true,
            "sort": "date",
            "filters": { "site": "docs.rs" },
            "tags": ["a", "b"]
        });
        assert!(schema.validate(&args).is_ok());
    }

    #[test]
    fn missing_required_field_rejected() {
        let schema = search_schema();
        let errs = schema.validate(&json!({"limit": 5})).unwrap_err();
        assert!(errs.iter().any(|v| v.path == "query" && v.message.contains("missing")));
    }

    #[test]
    fn undeclared_field_rejected() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"query": "x", "verbose": true}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "verbose" && v.message.contains("undeclared")));
    }

    #[test]
    fn wrong_type_rejected() {
        let schema = search_schema();
        let errs = schema.validate(&json!({"query": 42})).unwrap_err();
        assert!(errs.iter().any(|v| v.path == "query" && v.message.contains("expected string")));
    }

    #[test]
    fn range_violations_rejected() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"query": "x", "limit": 500}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "limit" && v.message.contains("maximum")));

        let errs = schema
            .validate(&json!({"query": "x", "limit": 0}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "limit" && v.message.contains("minimum")));
    }

    #[test]
    fn enum_violations_rejected() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"query": "x", "sort": "alphabetical"}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "sort" && v.message.contains("permitted")));
    }

    #[test]
    fn nested_objects_validated() {
        let schema = search_schema();
        // Missing nested required field.
        let errs = schema
            .validate(&json!({"query": "x", "filters": {}}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "filters.site"));

        // Undeclared nested field.
        let errs = schema
            .validate(&json!({"query": "x", "filters": {"site": "a", "lang": "en"}}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "filters.lang"));
    }

    #[test]
    fn array_items_validated() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"query": "x", "tags": ["ok", 7]}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "tags[1]"));
    }

    #[test]
    fn non_object_arguments_rejected() {
        let schema = search_schema();
        let errs = schema.validate(&json!("just a string")).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("must be an object"));
    }

    #[test]
    fn multiple_violations_all_reported() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"limit": "many", "extra": 1}))
            .unwrap_err();
        // Missing query, wrong limit type, undeclared extra.
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn integer_type_rejects_floats() {
        let schema = search_schema();
        let errs = schema
            .validate(&json!({"query": "x", "limit": 2.5}))
            .unwrap_err();
        assert!(errs.iter().any(|v| v.path == "limit" && v.message.contains("expected integer")));
    }
}
