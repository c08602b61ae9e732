//! Planning: what an apply would do to one resource.
//!
//! [`plan_resource`] works purely on the schema and JSON values. It fills in
//! defaults, carries computed values the configuration leaves out (unless a
//! conflicting attribute is now set), compares sets without regard to order
//! and flags changes to `force_new` attributes as requiring replacement.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::is_set;

/// Plan a resource change.
///
/// - `prior` is `None` for a resource that does not exist yet.
/// - A `Null` proposal destroys the resource.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let Some(prior) = prior else {
            return Ok(PlanResult::no_change(Value::Null));
        };
        let changes = schema
            .attributes
            .keys()
            .filter_map(|name| {
                present(prior.get(name)).map(|v| AttributeChange::removed(name.as_str(), v.clone()))
            })
            .collect();
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let proposed = proposed.as_object().ok_or_else(|| {
        ProviderError::InvalidRequest("proposed state must be an object".to_string())
    })?;

    let mut planned = Map::new();
    for (name, attr) in &schema.attributes {
        // A computed value cannot survive next to an attribute it conflicts with
        let prior_value = prior
            .and_then(|p| present(p.get(name)))
            .filter(|_| !conflicting_set(schema, name, attr, proposed));
        let value = plan_attribute(attr, present(proposed.get(name)), prior_value);
        planned.insert(name.clone(), value);
    }

    let Some(prior) = prior else {
        let changes = planned
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(name, v)| AttributeChange::added(name.as_str(), v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(Value::Object(planned), changes, false));
    };

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for (name, attr) in &schema.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        let before = present(prior.get(name));
        let after = present(planned.get(name));
        if values_equal(&attr.attr_type, before, after) {
            continue;
        }
        requires_replace |= attr.force_new;
        changes.push(AttributeChange::new(
            name.as_str(),
            before.cloned(),
            after.cloned(),
        ));
    }

    if requires_replace {
        // A replacement gets fresh computed values
        for (name, attr) in &schema.attributes {
            if attr.flags.is_computed_only() {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_attribute(attr: &Attribute, proposed: Option<&Value>, prior: Option<&Value>) -> Value {
    if attr.flags.is_computed_only() {
        return prior.cloned().unwrap_or(Value::Null);
    }
    if let Some(value) = proposed {
        return value.clone();
    }
    if let Some(default) = &attr.default {
        return default.clone();
    }
    if attr.flags.computed {
        return prior.cloned().unwrap_or(Value::Null);
    }
    Value::Null
}

/// Whether the proposal sets an attribute that conflicts with `name`, in
/// either direction of `conflicts_with`.
fn conflicting_set(
    schema: &Schema,
    name: &str,
    attr: &Attribute,
    proposed: &Map<String, Value>,
) -> bool {
    schema.attributes.iter().any(|(other, other_attr)| {
        let conflicts = attr.conflicts_with.iter().any(|c| c == other)
            || other_attr.conflicts_with.iter().any(|c| c == name);
        conflicts && is_set(proposed.get(other))
    })
}

/// `None` for absent and `null` values.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Compare two attribute values. Unset and empty are the same; sets ignore
/// order.
fn values_equal(attr_type: &AttributeType, a: Option<&Value>, b: Option<&Value>) -> bool {
    match attr_type {
        AttributeType::Set(_) => set_elements(a) == set_elements(b),
        AttributeType::String => match (a, b) {
            (None, Some(Value::String(s))) | (Some(Value::String(s)), None) => s.is_empty(),
            _ => a == b,
        },
        AttributeType::Bool => a == b,
    }
}

fn set_elements(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(Value::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{notification_configuration, variable_set};
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_creates, assert_plan_does_not_change_attribute,
        assert_plan_no_changes, assert_plan_replaces, assert_plan_updates_in_place,
    };
    use serde_json::json;

    fn existing_varset() -> Value {
        json!({
            "id": "varset-0000000000000001",
            "name": "shared",
            "description": null,
            "global": false,
            "organization": "acme",
            "workspace_ids": ["ws-a", "ws-b"]
        })
    }

    #[test]
    fn test_create_fills_defaults() {
        let plan = plan_resource(
            &notification_configuration::schema(),
            None,
            &json!({"name": "hook", "destination_type": "generic", "workspace_id": "ws-123"}),
        )
        .unwrap();

        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["enabled"], json!(false));
        assert!(plan.planned_state["id"].is_null());
        assert_plan_changes_attribute(&plan, "enabled");
        assert_plan_does_not_change_attribute(&plan, "id");
    }

    #[test]
    fn test_set_order_is_not_a_change() {
        let mut proposed = existing_varset();
        proposed["workspace_ids"] = json!(["ws-b", "ws-a"]);

        let plan =
            plan_resource(&variable_set::schema(), Some(&existing_varset()), &proposed).unwrap();
        assert_plan_no_changes(&plan);
    }

    #[test]
    fn test_omitted_computed_attribute_keeps_prior_value() {
        let plan = plan_resource(
            &variable_set::schema(),
            Some(&existing_varset()),
            &json!({"name": "shared"}),
        )
        .unwrap();

        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["organization"], "acme");
        assert_eq!(plan.planned_state["id"], "varset-0000000000000001");
    }

    #[test]
    fn test_conflicting_attribute_drops_carried_value() {
        let plan = plan_resource(
            &variable_set::schema(),
            Some(&existing_varset()),
            &json!({"name": "shared", "global": true}),
        )
        .unwrap();

        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "global");
        assert_plan_changes_attribute(&plan, "workspace_ids");
        assert!(plan.planned_state["workspace_ids"].is_null());
        assert_eq!(plan.planned_state["organization"], "acme");
    }

    #[test]
    fn test_unset_conflicting_attribute_keeps_carried_value() {
        let plan = plan_resource(
            &variable_set::schema(),
            Some(&existing_varset()),
            &json!({"name": "shared", "global": false}),
        )
        .unwrap();

        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["workspace_ids"], json!(["ws-a", "ws-b"]));
    }

    #[test]
    fn test_in_place_update() {
        let mut proposed = existing_varset();
        proposed["workspace_ids"] = json!(["ws-b", "ws-c"]);
        proposed["description"] = json!("now described");

        let plan =
            plan_resource(&variable_set::schema(), Some(&existing_varset()), &proposed).unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "workspace_ids");
        assert_plan_changes_attribute(&plan, "description");
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_empty_string_equals_unset() {
        let mut proposed = existing_varset();
        proposed["description"] = json!("");

        let plan =
            plan_resource(&variable_set::schema(), Some(&existing_varset()), &proposed).unwrap();
        assert_plan_no_changes(&plan);
    }

    #[test]
    fn test_force_new_requires_replacement() {
        let mut proposed = existing_varset();
        proposed["organization"] = json!("other-org");

        let plan =
            plan_resource(&variable_set::schema(), Some(&existing_varset()), &proposed).unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "organization");
        assert!(plan.planned_state["id"].is_null());
    }

    #[test]
    fn test_null_proposal_destroys() {
        let plan =
            plan_resource(&variable_set::schema(), Some(&existing_varset()), &Value::Null).unwrap();
        assert!(plan.is_destroy());
        assert_plan_changes_attribute(&plan, "name");
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_non_object_proposal_is_rejected() {
        let err = plan_resource(&variable_set::schema(), None, &json!("shared")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
