//! `tfe_variable_set`: a variable set and the workspaces it applies to.
//!
//! The workspace association cannot be expressed in the creation request, so a
//! new non-global set with workspaces takes a second call. On update the
//! association is replaced wholesale, and only when it changed.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_set, non_empty, null_as_default};
use crate::api::{
    VariableSet, VariableSetCreateOptions, VariableSetReadOptions, VariableSetUpdateOptions,
    VariableSetUpdateWorkspacesOptions, VariableSets, WorkspaceRef,
};
use crate::error::{ApiError, ValidationError};
use crate::reconcile::Reconcile;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "tfe_variable_set";

static ID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^varset-[a-zA-Z0-9]{16}$").expect("identifier pattern compiles")
});

/// Desired state of a variable set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetConfig {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Apply to every workspace of the organization.
    #[serde(default, deserialize_with = "null_as_default")]
    pub global: bool,
    /// Owning organization. Cannot change in place.
    pub organization: String,
    /// Workspaces the set is applied to. Must be empty when `global`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub workspace_ids: BTreeSet<String>,
}

impl VariableSetConfig {
    /// A non-global set without description or workspaces.
    pub fn new(name: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            global: false,
            organization: organization.into(),
            workspace_ids: BTreeSet::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Make the set global or not.
    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Set the workspaces the set applies to.
    pub fn with_workspace_ids<I, S>(mut self, workspace_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workspace_ids = workspace_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Check the field rules: a global set takes no workspace list.
pub fn validate(config: &VariableSetConfig) -> Result<(), ValidationError> {
    if config.global && !config.workspace_ids.is_empty() {
        return Err(ValidationError::Conflict {
            field: "workspace_ids",
            other: "global",
        });
    }
    if config.organization.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "organization",
            detail: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Options for creating the configured set. Workspaces are applied separately.
pub fn create_options(config: &VariableSetConfig) -> VariableSetCreateOptions {
    VariableSetCreateOptions {
        name: config.name.clone(),
        description: config.description.clone().unwrap_or_default(),
        global: config.global,
    }
}

/// Options for updating the set's own fields.
pub fn update_options(config: &VariableSetConfig) -> VariableSetUpdateOptions {
    VariableSetUpdateOptions {
        name: config.name.clone(),
        description: config.description.clone().unwrap_or_default(),
        global: config.global,
    }
}

/// Options that replace the applied workspaces with the configured ones.
pub fn workspaces_options(config: &VariableSetConfig) -> VariableSetUpdateWorkspacesOptions {
    VariableSetUpdateWorkspacesOptions {
        workspaces: config.workspace_ids.iter().map(WorkspaceRef::new).collect(),
    }
}

/// Project an API entity into configuration-shaped state.
pub fn project(remote: &VariableSet) -> VariableSetConfig {
    VariableSetConfig {
        name: remote.name.clone(),
        description: non_empty(&remote.description),
        global: remote.global,
        organization: remote.organization.name.clone(),
        workspace_ids: remote.workspaces.iter().map(|w| w.id.clone()).collect(),
    }
}

/// Schema of `tfe_variable_set`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A set of variables that can be applied to many workspaces at once.")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Variable set ID."),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the variable set."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_description("Description of the variable set."),
        )
        .with_attribute(
            "global",
            Attribute::optional_bool()
                .with_default(serde_json::Value::Bool(false))
                .with_conflicts_with(["workspace_ids"])
                .with_description("Apply the set to every workspace in the organization."),
        )
        .with_attribute(
            "organization",
            Attribute::optional_string()
                .computed()
                .with_force_new()
                .with_description(
                    "Organization that owns the set. Defaults to the provider's default organization.",
                ),
        )
        .with_attribute(
            "workspace_ids",
            Attribute::optional_string_set()
                .computed()
                .with_description("IDs of the workspaces the set is applied to."),
        )
}

/// Variable sets, reconciled against the given API.
#[derive(Clone)]
pub struct VariableSetResource {
    api: Arc<dyn VariableSets>,
}

impl VariableSetResource {
    /// Reconcile against `api`.
    pub fn new(api: Arc<dyn VariableSets>) -> Self {
        Self { api }
    }
}

impl fmt::Debug for VariableSetResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableSetResource").finish_non_exhaustive()
    }
}

#[async_trait]
impl Reconcile for VariableSetResource {
    type Config = VariableSetConfig;
    type Remote = VariableSet;

    const TYPE_NAME: &'static str = TYPE_NAME;
    const KIND: &'static str = "variable set";

    fn validate(&self, config: &Self::Config) -> Result<(), ValidationError> {
        validate(config)
    }

    fn describe(&self, config: &Self::Config) -> String {
        format!("{} (organization {})", config.name, config.organization)
    }

    fn is_valid_id(&self, id: &str) -> bool {
        ID_FORMAT.is_match(id)
    }

    fn remote_id(remote: &Self::Remote) -> &str {
        &remote.id
    }

    fn project(&self, remote: &Self::Remote, _prior: Option<&Self::Config>) -> Self::Config {
        project(remote)
    }

    fn replacement_field(&self, prior: &Self::Config, config: &Self::Config) -> Option<&'static str> {
        (prior.organization != config.organization).then_some("organization")
    }

    fn scalars_changed(&self, prior: &Self::Config, config: &Self::Config) -> bool {
        let description = |c: &VariableSetConfig| c.description.clone().filter(|_| is_set(&c.description));
        prior.name != config.name
            || description(prior) != description(config)
            || prior.global != config.global
    }

    fn associations_changed(&self, prior: &Self::Config, config: &Self::Config) -> bool {
        prior.workspace_ids != config.workspace_ids
    }

    fn needs_association_after_create(&self, config: &Self::Config) -> bool {
        !config.global && !config.workspace_ids.is_empty()
    }

    async fn create_remote(&self, config: &Self::Config) -> Result<Self::Remote, ApiError> {
        self.api
            .create(&config.organization, create_options(config))
            .await
    }

    async fn read_remote(&self, id: &str) -> Result<Self::Remote, ApiError> {
        self.api
            .read(id, VariableSetReadOptions::with_workspaces())
            .await
    }

    async fn update_remote(&self, id: &str, config: &Self::Config) -> Result<Self::Remote, ApiError> {
        self.api.update(id, update_options(config)).await
    }

    async fn update_associations_remote(
        &self,
        id: &str,
        config: &Self::Config,
    ) -> Result<Self::Remote, ApiError> {
        self.api
            .update_workspaces(id, workspaces_options(config))
            .await
    }

    async fn delete_remote(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::reconcile::Reconciler;
    use crate::testing::{Call, FakeTfe};

    fn reconciler(fake: &Arc<FakeTfe>) -> Reconciler<VariableSetResource> {
        Reconciler::new(VariableSetResource::new(fake.clone()))
    }

    #[test]
    fn test_global_conflicts_with_workspace_ids() {
        let config = VariableSetConfig::new("shared", "acme")
            .with_global(true)
            .with_workspace_ids(["ws-a"]);
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "workspace_ids conflicts with global");

        assert!(validate(&VariableSetConfig::new("shared", "acme").with_global(true)).is_ok());
    }

    #[test]
    fn test_empty_organization_is_rejected() {
        let err = validate(&VariableSetConfig::new("shared", "")).unwrap_err();
        assert_eq!(err.field(), "organization");
    }

    #[test]
    fn test_mapper_wraps_workspace_refs() {
        let config = VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-b", "ws-a"]);
        let options = workspaces_options(&config);
        let mut ids: Vec<_> = options.workspaces.iter().map(|w| w.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["ws-a", "ws-b"]);

        assert_eq!(create_options(&config).description, "");
    }

    #[test]
    fn test_projector_maps_nested_references() {
        let remote = VariableSet {
            id: "varset-AAAAAAAAAAAAAAAA".to_string(),
            name: "shared".to_string(),
            description: String::new(),
            global: false,
            organization: crate::api::OrganizationRef {
                name: "acme".to_string(),
            },
            workspaces: vec![WorkspaceRef::new("ws-a"), WorkspaceRef::new("ws-b")],
        };
        let projected = project(&remote);
        assert_eq!(projected.organization, "acme");
        assert!(projected.description.is_none());
        assert_eq!(projected.workspace_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_create_applies_workspaces_in_a_second_call() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let config = VariableSetConfig::new("shared", "acme")
            .with_description("common settings")
            .with_workspace_ids(["ws-a", "ws-b"]);

        let created = reconciler.create(&config).await.unwrap();
        assert_eq!(created.config, config);
        assert_eq!(
            fake.calls(),
            vec![
                Call::VariableSetCreate,
                Call::VariableSetUpdateWorkspaces,
                Call::VariableSetRead
            ]
        );
    }

    #[tokio::test]
    async fn test_create_without_workspaces_skips_association() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);

        reconciler
            .create(&VariableSetConfig::new("shared", "acme").with_global(true))
            .await
            .unwrap();
        assert!(!fake.calls().contains(&Call::VariableSetUpdateWorkspaces));
    }

    #[tokio::test]
    async fn test_failed_association_after_create_returns_no_id() {
        let fake = Arc::new(FakeTfe::new());
        fake.fail_next(
            Call::VariableSetUpdateWorkspaces,
            ApiError::Conflict("workspace ws-x not found".to_string()),
        );
        let reconciler = reconciler(&fake);

        let err = reconciler
            .create(&VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-x"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Remote {
                operation: crate::error::Operation::UpdateAssociations,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_association_set_is_replaced_not_merged() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let base = VariableSetConfig::new("shared", "acme");

        let created = reconciler
            .create(&base.clone().with_workspace_ids(["ws-a", "ws-b"]))
            .await
            .unwrap();
        let updated = reconciler
            .update(&created, &base.clone().with_workspace_ids(["ws-b", "ws-c"]))
            .await
            .unwrap();

        let expected: BTreeSet<String> = ["ws-b", "ws-c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(updated.config.workspace_ids, expected);
        assert_eq!(fake.variable_set_workspaces(&created.id), expected);
    }

    #[tokio::test]
    async fn test_update_sends_only_what_changed() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme"))
            .await
            .unwrap();
        fake.clear_calls();

        let with_workspaces = created.config.clone().with_workspace_ids(["ws-a"]);
        let updated = reconciler.update(&created, &with_workspaces).await.unwrap();
        assert_eq!(
            fake.calls(),
            vec![Call::VariableSetUpdateWorkspaces, Call::VariableSetRead]
        );
        fake.clear_calls();

        let renamed = updated.config.clone().with_description("now described");
        reconciler.update(&updated, &renamed).await.unwrap();
        assert_eq!(fake.calls(), vec![Call::VariableSetUpdate, Call::VariableSetRead]);
    }

    #[tokio::test]
    async fn test_scalar_failure_aborts_before_association_update() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-a"]))
            .await
            .unwrap();
        fake.clear_calls();
        fake.fail_next(Call::VariableSetUpdate, ApiError::Unavailable("502".to_string()));

        let changed = VariableSetConfig::new("renamed", "acme").with_workspace_ids(["ws-b"]);
        let err = reconciler.update(&created, &changed).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Error updating variable set {}: service unavailable: 502",
                created.id
            )
        );
        assert_eq!(fake.calls(), vec![Call::VariableSetUpdate]);
        assert_eq!(
            fake.variable_set_workspaces(&created.id),
            ["ws-a".to_string()].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_scalars_then_associations_in_one_pass() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-a"]))
            .await
            .unwrap();
        fake.clear_calls();

        let changed = VariableSetConfig::new("renamed", "acme").with_workspace_ids(["ws-b"]);
        let updated = reconciler.update(&created, &changed).await.unwrap();
        assert_eq!(updated.config, changed);
        assert_eq!(
            fake.calls(),
            vec![
                Call::VariableSetUpdate,
                Call::VariableSetUpdateWorkspaces,
                Call::VariableSetRead
            ]
        );
    }

    #[tokio::test]
    async fn test_moving_organization_is_refused() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme"))
            .await
            .unwrap();

        let err = reconciler
            .update(&created, &VariableSetConfig::new("shared", "other-org"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("organization cannot be changed in place"));
    }

    #[tokio::test]
    async fn test_drift_and_idempotent_delete() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme"))
            .await
            .unwrap();

        fake.remove_variable_set(&created.id);
        assert!(reconciler.read(&created).await.unwrap().is_absent());
        reconciler.delete(&created.id).await.unwrap();
        reconciler.delete(&created.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_import_matches_read() {
        let fake = Arc::new(FakeTfe::new());
        let reconciler = reconciler(&fake);
        let created = reconciler
            .create(&VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-a"]))
            .await
            .unwrap();

        let imported = reconciler.import(&created.id).await.unwrap();
        assert_eq!(imported.into_present(), Some(created));
    }
}
