//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` against a [`Schema`] before it is decoded
//! into a typed configuration, so that shape errors come back as diagnostics
//! pointing at the offending attribute.
//!
//! # Example
//!
//! ```
//! use tfe_provider::schema::{Schema, Attribute};
//! use tfe_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("enabled", Attribute::optional_bool());
//!
//! let diagnostics = validate(&schema, &json!({"name": "test", "enabled": true}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "test", "enabled": "yes"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("enabled".to_string()));
//! ```

use std::collections::BTreeSet;

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Validate a JSON object against a schema.
///
/// Returns every problem found; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - Strings (and string set elements) must be one of the allowed values, if any
/// - Set elements must be unique
/// - Two conflicting attributes must not both be set
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        }
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for (name, attr) in &schema.attributes {
        if !is_set(obj.get(name)) {
            continue;
        }
        for other in &attr.conflicts_with {
            if is_set(obj.get(other)) {
                diagnostics.push(
                    Diagnostic::error(format!("{} conflicts with {}", name, other))
                        .with_detail(format!("Only one of '{}' and '{}' can be set", name, other))
                        .with_attribute(name.as_str()),
                );
            }
        }
    }

    diagnostics
}

/// Like [`validate`], but `Err` with the diagnostics if there are any.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => validate_attribute_type(attr, &attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr: &Attribute,
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => match value.as_str() {
            Some(s) => {
                if !attr.allowed_values.is_empty() && !attr.allowed_values.iter().any(|a| a == s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Expected one of [{}], got {:?}",
                                attr.allowed_values.join(", "),
                                s
                            ))
                            .with_attribute(path),
                    );
                }
            }
            None => diagnostics.push(type_error(path, "string", value)),
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::Set(element_type) => {
            // Sets travel as JSON arrays
            let Some(arr) = value.as_array() else {
                diagnostics.push(type_error(path, "set", value));
                return;
            };
            let mut seen = BTreeSet::new();
            for (i, elem) in arr.iter().enumerate() {
                let elem_path = format!("{}.{}", path, i);
                validate_attribute_type(attr, element_type, elem, &elem_path, diagnostics);
                if !seen.insert(elem.to_string()) {
                    diagnostics.push(
                        Diagnostic::error(format!("Duplicate element in set '{}'", path))
                            .with_detail(format!("{} appears more than once", elem))
                            .with_attribute(elem_path),
                    );
                }
            }
        }
    }
}

/// Whether a value counts as set for conflict checks. Zero values do not.
pub(crate) fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{notification_configuration, variable_set};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "test"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("enabled", Attribute::optional_bool());

        assert!(validate(&schema, &json!({"enabled": true})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"enabled": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"enabled": "true"})).len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_non_object_input() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!(["name"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }

    #[test]
    fn test_allowed_values() {
        let schema = notification_configuration::schema();
        let config = json!({
            "name": "hook",
            "destination_type": "carrier-pigeon",
            "workspace_id": "ws-123"
        });

        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("destination_type"));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("microsoft-teams"));
    }

    #[test]
    fn test_allowed_values_apply_per_set_element() {
        let schema = notification_configuration::schema();
        let config = json!({
            "name": "hook",
            "destination_type": "generic",
            "workspace_id": "ws-123",
            "triggers": ["run:created", "run:exploded"]
        });

        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("triggers.1"));
    }

    #[test]
    fn test_duplicate_set_elements() {
        let schema = Schema::v0().with_attribute("tags", Attribute::optional_string_set());
        let diagnostics = validate(&schema, &json!({"tags": ["a", "b", "a"]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Duplicate"));
    }

    #[test]
    fn test_conflicting_attributes() {
        let schema = variable_set::schema();

        let diagnostics = validate(
            &schema,
            &json!({"name": "shared", "global": true, "workspace_ids": ["ws-a"]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "global conflicts with workspace_ids");

        // Zero values do not count as set
        assert!(validate(
            &schema,
            &json!({"name": "shared", "global": false, "workspace_ids": ["ws-a"]})
        )
        .is_empty());
        assert!(validate(&schema, &json!({"name": "shared", "global": true, "workspace_ids": []})).is_empty());
    }

    #[test]
    fn test_validate_result() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(validate_result(&schema, &json!({"name": "x"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
        assert!(validate_result(&schema, &json!({"name": false})).is_err());
    }
}
