use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OrganizationRef, WorkspaceRef};
use crate::error::ApiError;

/// A variable set as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSet {
    /// Server-assigned identifier (`varset-...`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the set applies to every workspace of the organization.
    pub global: bool,
    /// The owning organization.
    pub organization: OrganizationRef,
    /// Workspaces the set is applied to. Only populated when requested with
    /// [`VariableSetInclude::Workspaces`].
    #[serde(default)]
    pub workspaces: Vec<WorkspaceRef>,
}

/// Options for creating a variable set.
///
/// Workspaces cannot be attached at creation; that takes a separate
/// [`VariableSets::update_workspaces`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetCreateOptions {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether the set applies to every workspace.
    pub global: bool,
}

/// Options for updating a variable set's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetUpdateOptions {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether the set applies to every workspace.
    pub global: bool,
}

/// Related records that can be embedded in a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSetInclude {
    /// Embed the workspaces the set is applied to.
    Workspaces,
    /// Embed the set's variables.
    Vars,
}

/// Options for reading a variable set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetReadOptions {
    /// Related records to embed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<VariableSetInclude>,
}

impl VariableSetReadOptions {
    /// Read options that embed the applied workspaces.
    pub fn with_workspaces() -> Self {
        Self {
            include: vec![VariableSetInclude::Workspaces],
        }
    }
}

/// Options for replacing the set of workspaces a variable set applies to.
///
/// The list is authoritative: workspaces not in it are detached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetUpdateWorkspacesOptions {
    /// The complete new set of workspaces.
    pub workspaces: Vec<WorkspaceRef>,
}

/// Variable set endpoints.
#[async_trait]
pub trait VariableSets: Send + Sync {
    /// Create a variable set in an organization.
    async fn create(
        &self,
        organization: &str,
        options: VariableSetCreateOptions,
    ) -> Result<VariableSet, ApiError>;

    /// Read a variable set by identifier.
    async fn read(&self, id: &str, options: VariableSetReadOptions)
        -> Result<VariableSet, ApiError>;

    /// Update a variable set's own fields.
    async fn update(
        &self,
        id: &str,
        options: VariableSetUpdateOptions,
    ) -> Result<VariableSet, ApiError>;

    /// Replace the workspaces a variable set applies to.
    async fn update_workspaces(
        &self,
        id: &str,
        options: VariableSetUpdateWorkspacesOptions,
    ) -> Result<VariableSet, ApiError>;

    /// Delete a variable set.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
