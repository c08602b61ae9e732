//! The remote workspace-management API, as seen by the resources.
//!
//! Each entity kind gets a trait with one method per remote call and the
//! option/entity types those calls exchange. The HTTP transport lives outside
//! this crate: anything that implements the traits can back the resources,
//! including [`crate::testing::FakeTfe`].

mod notification_configurations;
mod variable_sets;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use crate::error::ApiError;
pub use notification_configurations::{
    DestinationType, NotificationConfiguration, NotificationConfigurationCreateOptions,
    NotificationConfigurationUpdateOptions, NotificationConfigurations, Trigger,
};
pub use variable_sets::{
    VariableSet, VariableSetCreateOptions, VariableSetInclude, VariableSetReadOptions,
    VariableSetUpdateOptions, VariableSetUpdateWorkspacesOptions, VariableSets,
};

/// A reference to a workspace, carrying only its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef {
    /// Workspace identifier (`ws-...`).
    pub id: String,
}

impl WorkspaceRef {
    /// Create a reference to the given workspace.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A reference to a user, carrying only its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    /// User identifier (`user-...`).
    pub id: String,
}

impl UserRef {
    /// Create a reference to the given user.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A reference to an organization, carrying only its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationRef {
    /// Organization name.
    pub name: String,
}

/// Handles to every API the provider talks to.
///
/// Passed explicitly to each resource; there is no process-wide client.
#[derive(Clone)]
pub struct Client {
    /// Notification configuration endpoints.
    pub notification_configurations: Arc<dyn NotificationConfigurations>,
    /// Variable set endpoints.
    pub variable_sets: Arc<dyn VariableSets>,
}

impl Client {
    /// Bundle the given API handles.
    pub fn new(
        notification_configurations: Arc<dyn NotificationConfigurations>,
        variable_sets: Arc<dyn VariableSets>,
    ) -> Self {
        Self {
            notification_configurations,
            variable_sets,
        }
    }

    /// Build a client whose APIs are all served by one backend.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: NotificationConfigurations + VariableSets + 'static,
    {
        Self {
            notification_configurations: backend.clone(),
            variable_sets: backend,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}
