//! Testing utilities for the provider.
//!
//! [`FakeTfe`] is an in-memory stand-in for the remote API. It implements every
//! API trait, hands out identifiers in the real formats, never echoes tokens
//! back, records the calls it receives and can be told to fail the next call
//! of a given kind.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through whole lifecycles
//! with JSON values, the way a host would.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use tfe_provider::testing::{FakeTfe, ProviderTester};
//! use tfe_provider::{Client, TfeProvider};
//!
//! #[tokio::test]
//! async fn test_create_variable_set() {
//!     let fake = Arc::new(FakeTfe::new());
//!     let tester = ProviderTester::new(TfeProvider::new(Client::from_backend(fake)));
//!     tester
//!         .configure(json!({"token": "t0k3n", "default_organization": "acme"}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("tfe_variable_set", json!({"name": "shared"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["organization"], "acme");
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{
    NotificationConfiguration, NotificationConfigurationCreateOptions,
    NotificationConfigurationUpdateOptions, NotificationConfigurations, OrganizationRef,
    VariableSet, VariableSetCreateOptions, VariableSetInclude, VariableSetReadOptions,
    VariableSetUpdateOptions, VariableSetUpdateWorkspacesOptions, VariableSets, WorkspaceRef,
};
use crate::error::{ApiError, ProviderError};
use crate::logging::try_init_logging;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// Fake remote API
// =========================================================================

/// A remote call received by [`FakeTfe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// `NotificationConfigurations::create`
    NotificationCreate,
    /// `NotificationConfigurations::read`
    NotificationRead,
    /// `NotificationConfigurations::update`
    NotificationUpdate,
    /// `NotificationConfigurations::delete`
    NotificationDelete,
    /// `VariableSets::create`
    VariableSetCreate,
    /// `VariableSets::read`
    VariableSetRead,
    /// `VariableSets::update`
    VariableSetUpdate,
    /// `VariableSets::update_workspaces`
    VariableSetUpdateWorkspaces,
    /// `VariableSets::delete`
    VariableSetDelete,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    calls: Vec<Call>,
    failures: Vec<(Call, ApiError)>,
    notification_configurations: BTreeMap<String, NotificationConfiguration>,
    notification_tokens: BTreeMap<String, String>,
    variable_sets: BTreeMap<String, VariableSet>,
}

impl FakeState {
    /// Record a call and hand back the failure queued for it, if any.
    fn record(&mut self, call: Call) -> Result<(), ApiError> {
        self.calls.push(call);
        match self.failures.iter().position(|(c, _)| *c == call) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:016}", prefix, self.next_id)
    }
}

/// In-memory implementation of the remote API.
#[derive(Default)]
pub struct FakeTfe {
    state: Mutex<FakeState>,
}

impl FakeTfe {
    /// Create an empty fake with no entities.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A test that panicked while holding the lock has already failed.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next call of kind `call` fail with `error`.
    pub fn fail_next(&self, call: Call, error: ApiError) {
        self.state().failures.push((call, error));
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget the calls received so far.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of notification configurations that exist.
    pub fn notification_configuration_count(&self) -> usize {
        self.state().notification_configurations.len()
    }

    /// The token stored for a notification configuration.
    pub fn notification_token(&self, id: &str) -> Option<String> {
        self.state().notification_tokens.get(id).cloned()
    }

    /// Delete a notification configuration behind the provider's back.
    pub fn remove_notification_configuration(&self, id: &str) {
        let mut state = self.state();
        state.notification_configurations.remove(id);
        state.notification_tokens.remove(id);
    }

    /// Number of variable sets that exist.
    pub fn variable_set_count(&self) -> usize {
        self.state().variable_sets.len()
    }

    /// Identifiers of the workspaces a variable set is applied to.
    pub fn variable_set_workspaces(&self, id: &str) -> BTreeSet<String> {
        self.state()
            .variable_sets
            .get(id)
            .map(|set| set.workspaces.iter().map(|w| w.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Delete a variable set behind the provider's back.
    pub fn remove_variable_set(&self, id: &str) {
        self.state().variable_sets.remove(id);
    }
}

impl std::fmt::Debug for FakeTfe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("FakeTfe")
            .field(
                "notification_configurations",
                &state.notification_configurations.len(),
            )
            .field("variable_sets", &state.variable_sets.len())
            .finish()
    }
}

fn store_token(tokens: &mut BTreeMap<String, String>, id: &str, token: Option<String>) {
    match token {
        Some(token) if !token.is_empty() => {
            tokens.insert(id.to_string(), token);
        }
        Some(_) => {
            tokens.remove(id);
        }
        None => {}
    }
}

#[async_trait]
impl NotificationConfigurations for FakeTfe {
    async fn create(
        &self,
        workspace_id: &str,
        options: NotificationConfigurationCreateOptions,
    ) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state();
        state.record(Call::NotificationCreate)?;

        let id = state.allocate_id("nc");
        let entity = NotificationConfiguration {
            id: id.clone(),
            name: options.name,
            destination_type: options.destination_type,
            enabled: options.enabled,
            email_addresses: options.email_addresses,
            email_users: options.email_users,
            triggers: options.triggers,
            url: options.url.unwrap_or_default(),
            subscribable: WorkspaceRef::new(workspace_id),
        };
        store_token(&mut state.notification_tokens, &id, options.token);
        state
            .notification_configurations
            .insert(id, entity.clone());
        Ok(entity)
    }

    async fn read(&self, id: &str) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state();
        state.record(Call::NotificationRead)?;
        state
            .notification_configurations
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn update(
        &self,
        id: &str,
        options: NotificationConfigurationUpdateOptions,
    ) -> Result<NotificationConfiguration, ApiError> {
        let mut state = self.state();
        state.record(Call::NotificationUpdate)?;

        let entity = state
            .notification_configurations
            .get_mut(id)
            .ok_or(ApiError::NotFound)?;
        entity.name = options.name;
        entity.enabled = options.enabled;
        entity.email_addresses = options.email_addresses;
        entity.email_users = options.email_users;
        entity.triggers = options.triggers;
        if let Some(url) = options.url {
            entity.url = url;
        }
        let updated = entity.clone();
        store_token(&mut state.notification_tokens, id, options.token);
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(Call::NotificationDelete)?;
        state.notification_tokens.remove(id);
        state
            .notification_configurations
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl VariableSets for FakeTfe {
    async fn create(
        &self,
        organization: &str,
        options: VariableSetCreateOptions,
    ) -> Result<VariableSet, ApiError> {
        let mut state = self.state();
        state.record(Call::VariableSetCreate)?;

        let id = state.allocate_id("varset");
        let entity = VariableSet {
            id: id.clone(),
            name: options.name,
            description: options.description,
            global: options.global,
            organization: OrganizationRef {
                name: organization.to_string(),
            },
            workspaces: Vec::new(),
        };
        state.variable_sets.insert(id, entity.clone());
        Ok(entity)
    }

    async fn read(&self, id: &str, options: VariableSetReadOptions) -> Result<VariableSet, ApiError> {
        let mut state = self.state();
        state.record(Call::VariableSetRead)?;

        let mut entity = state
            .variable_sets
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)?;
        if !options.include.contains(&VariableSetInclude::Workspaces) {
            entity.workspaces.clear();
        }
        Ok(entity)
    }

    async fn update(
        &self,
        id: &str,
        options: VariableSetUpdateOptions,
    ) -> Result<VariableSet, ApiError> {
        let mut state = self.state();
        state.record(Call::VariableSetUpdate)?;

        let entity = state.variable_sets.get_mut(id).ok_or(ApiError::NotFound)?;
        entity.name = options.name;
        entity.description = options.description;
        entity.global = options.global;
        Ok(entity.clone())
    }

    async fn update_workspaces(
        &self,
        id: &str,
        options: VariableSetUpdateWorkspacesOptions,
    ) -> Result<VariableSet, ApiError> {
        let mut state = self.state();
        state.record(Call::VariableSetUpdateWorkspaces)?;

        let entity = state.variable_sets.get_mut(id).ok_or(ApiError::NotFound)?;
        entity.workspaces = options.workspaces;
        Ok(entity.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(Call::VariableSetDelete)?;
        state
            .variable_sets
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

// =========================================================================
// Provider harness
// =========================================================================

/// A test harness around a [`ProviderService`].
///
/// # Example
///
/// ```ignore
/// let tester = ProviderTester::new(provider);
/// tester.configure(json!({"token": "t0k3n", "default_organization": "acme"})).await.unwrap();
/// let state = tester.create("tfe_variable_set", json!({"name": "shared"})).await.unwrap();
/// ```
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider. Logging goes to stderr
    /// unless a subscriber is already installed.
    pub fn new(provider: P) -> Self {
        try_init_logging();
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration. Error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration. Error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource. `None` means it is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Run plan, create and read. Returns the state after the read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read_existing(resource_type, created).await
    }

    /// Run plan, update and read. Returns the state after the read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::InvalidRequest(format!(
                "plan for {} requires replacement",
                resource_type
            )));
        }
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read_existing(resource_type, updated).await
    }

    /// Run plan and delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Run create, update and delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }

    async fn read_existing(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} disappeared during the lifecycle", resource_type))
        })
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan requires replacement or has no changes.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan changes the given attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan leaves the given attribute alone.
///
/// # Panics
///
/// Panics if the plan has a change for the given path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary contains
/// `substring`, attributed to `attribute` if given.
///
/// # Panics
///
/// Panics if no such error diagnostic exists.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str, attribute: Option<&str>) {
    let matching = diagnostics.iter().any(|d| {
        d.severity == DiagnosticSeverity::Error
            && d.summary.contains(substring)
            && attribute.map_or(true, |a| d.attribute.as_deref() == Some(a))
    });

    assert!(
        matching,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| (&d.summary, &d.attribute))
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_assigns_ids_in_real_formats() {
        let fake = FakeTfe::new();
        let set = VariableSets::create(
            &fake,
            "acme",
            VariableSetCreateOptions {
                name: "shared".to_string(),
                description: String::new(),
                global: false,
            },
        )
        .await
        .unwrap();
        assert!(set.id.starts_with("varset-"));
        assert_eq!(set.id.len(), "varset-".len() + 16);
    }

    #[tokio::test]
    async fn test_fake_failure_is_one_shot() {
        let fake = FakeTfe::new();
        fake.fail_next(Call::VariableSetRead, ApiError::Unavailable("503".to_string()));

        let first = VariableSets::read(&fake, "varset-x", VariableSetReadOptions::default()).await;
        assert_eq!(first.unwrap_err(), ApiError::Unavailable("503".to_string()));
        let second = VariableSets::read(&fake, "varset-x", VariableSetReadOptions::default()).await;
        assert_eq!(second.unwrap_err(), ApiError::NotFound);
        assert_eq!(fake.calls(), vec![Call::VariableSetRead, Call::VariableSetRead]);
    }

    #[tokio::test]
    async fn test_fake_omits_workspaces_unless_included() {
        let fake = FakeTfe::new();
        let set = VariableSets::create(
            &fake,
            "acme",
            VariableSetCreateOptions {
                name: "shared".to_string(),
                description: String::new(),
                global: false,
            },
        )
        .await
        .unwrap();
        VariableSets::update_workspaces(
            &fake,
            &set.id,
            VariableSetUpdateWorkspacesOptions {
                workspaces: vec![WorkspaceRef::new("ws-a")],
            },
        )
        .await
        .unwrap();

        let bare = VariableSets::read(&fake, &set.id, VariableSetReadOptions::default())
            .await
            .unwrap();
        assert!(bare.workspaces.is_empty());
        let full = VariableSets::read(&fake, &set.id, VariableSetReadOptions::with_workspaces())
            .await
            .unwrap();
        assert_eq!(full.workspaces, vec![WorkspaceRef::new("ws-a")]);
    }

    #[test]
    fn test_assert_no_errors() {
        let diagnostics = vec![Diagnostic::warning("Just a warning")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("url is required with destination type of slack")
            .with_attribute("url")];
        assert_error_contains(&diagnostics, "required", None);
        assert_error_contains(&diagnostics, "slack", Some("url"));
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("field1"));
        assert!(display.contains("More info"));
    }
}
