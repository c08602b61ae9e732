//! Resource kinds managed by the provider.
//!
//! Each module holds one kind's typed configuration, field validator, request
//! mapper, response projector, schema and [`crate::reconcile::Reconcile`]
//! implementation.

pub mod notification_configuration;
pub mod variable_set;

use serde::{Deserialize, Deserializer};

pub use notification_configuration::{
    DestinationType, NotificationConfigurationConfig, NotificationConfigurationResource, Trigger,
};
pub use variable_set::{VariableSetConfig, VariableSetResource};

/// Treat an explicit JSON `null` like an omitted field.
///
/// Terraform sends every schema attribute, unset ones as `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whether an optional string counts as set. Empty strings do not.
pub(crate) fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Drop empty strings.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
