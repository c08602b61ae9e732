//! Error types for the TFE provider.

use std::fmt;

use thiserror::Error;

/// A configuration record violates one of its entity's field rules.
///
/// Validation errors are raised before any remote call and always name the
/// offending field. Discriminant-driven rules also name the discriminant value
/// that forbids or requires the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The field must be empty under the active discriminant.
    #[error("{field} cannot be set with {discriminant_name} of {discriminant}")]
    Forbidden {
        /// The offending field.
        field: &'static str,
        /// How the discriminant field reads in messages, e.g. `destination type`.
        discriminant_name: &'static str,
        /// The discriminant value that forbids it.
        discriminant: &'static str,
    },

    /// The field must be set under the active discriminant.
    #[error("{field} is required with {discriminant_name} of {discriminant}")]
    Required {
        /// The missing field.
        field: &'static str,
        /// How the discriminant field reads in messages.
        discriminant_name: &'static str,
        /// The discriminant value that requires it.
        discriminant: &'static str,
    },

    /// Two fields that cannot be set together were both set.
    #[error("{field} conflicts with {other}")]
    Conflict {
        /// The offending field.
        field: &'static str,
        /// The field it conflicts with.
        other: &'static str,
    },

    /// A field holds a value outside of what the entity accepts.
    #[error("invalid value for {field}: {detail}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// What was wrong with the value.
        detail: String,
    },
}

impl ValidationError {
    /// The name of the field this error is about.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Forbidden { field, .. } => field,
            Self::Required { field, .. } => field,
            Self::Conflict { field, .. } => field,
            Self::InvalidValue { field, .. } => field,
        }
    }
}

/// Errors returned by the remote API collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The addressed entity does not exist (or is no longer visible).
    #[error("resource not found")]
    NotFound,

    /// The token was rejected or lacks permission for the call.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request conflicts with the current remote state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The API could not be reached or answered with a server error.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other failure reported by the API.
    #[error("{0}")]
    Other(String),
}

/// The reconciliation step a remote call was made for.
///
/// Used as the context prefix of [`ProviderError::Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating the entity.
    Create,
    /// Reading the entity by identifier.
    Read,
    /// Updating the entity's scalar fields.
    Update,
    /// Replacing the entity's association set.
    UpdateAssociations,
    /// Deleting the entity.
    Delete,
}

impl Operation {
    /// Short lowercase name, used as a structured logging field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::UpdateAssociations => "update_associations",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Create => "creating",
            Self::Read => "reading",
            Self::Update => "updating",
            Self::UpdateAssociations => "updating associations of",
            Self::Delete => "deleting",
        };
        f.write_str(verb)
    }
}

/// Errors that can occur while reconciling resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The configuration violates a field rule.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A remote call failed. Carries the operation, the resource kind and the
    /// identifier (or name, before one exists) the call was about.
    #[error("Error {operation} {resource} {target}: {source}")]
    Remote {
        /// The step that issued the call.
        operation: Operation,
        /// Human-readable resource kind, e.g. `variable set`.
        resource: &'static str,
        /// Identifier or name of the entity.
        target: String,
        /// The collaborator's error.
        #[source]
        source: ApiError,
    },

    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// An identifier does not match the format of its resource kind.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resource operation was requested before `configure`.
    #[error("Provider not configured")]
    NotConfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Invalid request from the caller (e.g. schema validation failures).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Wrap a collaborator error with the operation context.
    pub fn remote(
        operation: Operation,
        resource: &'static str,
        target: impl Into<String>,
        source: ApiError,
    ) -> Self {
        Self::Remote {
            operation,
            resource,
            target: target.into(),
            source,
        }
    }

    /// Get the error message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Remote { source, .. } => source.to_string(),
            Self::NotFound(msg) => msg.clone(),
            Self::InvalidId(msg) => msg.clone(),
            Self::Configuration(msg) => msg.clone(),
            Self::NotConfigured => "provider not configured".to_string(),
            Self::UnknownResource(msg) => msg.clone(),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// Whether this error means the addressed entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Remote {
                    source: ApiError::NotFound,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::Forbidden {
            field: "email_addresses",
            discriminant_name: "destination type",
            discriminant: "generic",
        };
        assert_eq!(
            err.to_string(),
            "email_addresses cannot be set with destination type of generic"
        );
        assert_eq!(err.field(), "email_addresses");

        let err = ValidationError::Required {
            field: "url",
            discriminant_name: "destination type",
            discriminant: "slack",
        };
        assert_eq!(
            err.to_string(),
            "url is required with destination type of slack"
        );

        let err = ValidationError::Conflict {
            field: "workspace_ids",
            other: "global",
        };
        assert_eq!(err.to_string(), "workspace_ids conflicts with global");
    }

    #[test]
    fn test_discriminant_name_is_part_of_the_message() {
        let err = ValidationError::Required {
            field: "ttl",
            discriminant_name: "record kind",
            discriminant: "cname",
        };
        assert_eq!(err.to_string(), "ttl is required with record kind of cname");
        assert_eq!(err.field(), "ttl");
    }

    #[test]
    fn test_remote_error_has_operation_prefix() {
        let err = ProviderError::remote(
            Operation::Create,
            "notification configuration",
            "deploy-hook",
            ApiError::Unauthorized("invalid token".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Error creating notification configuration deploy-hook: unauthorized: invalid token"
        );
        assert_eq!(err.message(), "unauthorized: invalid token");

        let err = ProviderError::remote(
            Operation::UpdateAssociations,
            "variable set",
            "varset-abcdefghijklmnop",
            ApiError::Conflict("workspace locked".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Error updating associations of variable set varset-abcdefghijklmnop: conflict: workspace locked"
        );
    }

    #[test]
    fn test_validation_from() {
        let err: ProviderError = ValidationError::Required {
            field: "url",
            discriminant_name: "destination type",
            discriminant: "generic",
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Validation error: url is required with destination type of generic"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(ProviderError::NotFound("nc-1".to_string()).is_not_found());
        assert!(ProviderError::remote(
            Operation::Read,
            "variable set",
            "varset-1",
            ApiError::NotFound
        )
        .is_not_found());
        assert!(!ProviderError::NotConfigured.is_not_found());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Create.as_str(), "create");
        assert_eq!(Operation::UpdateAssociations.as_str(), "update_associations");
        assert_eq!(Operation::Delete.to_string(), "deleting");
    }
}
