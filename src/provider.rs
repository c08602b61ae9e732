//! The TFE provider: JSON state in, typed reconciliation, JSON state out.
//!
//! [`TfeProvider`] implements [`ProviderService`] for
//! `tfe_notification_configuration` and `tfe_variable_set`. Every incoming
//! value is checked against the resource schema, decoded into the resource's
//! typed configuration and handed to its [`Reconciler`]; the result is encoded
//! back as state with an `id` attribute.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::api::Client;
use crate::config::{ProviderConfig, ResolvedConfig};
use crate::error::ProviderError;
use crate::reconcile::{Reconcile, Reconciler, ReadOutcome, Tracked};
use crate::resources::{notification_configuration, variable_set};
use crate::resources::{NotificationConfigurationResource, VariableSetResource};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::ImportedResource;
use crate::validation;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Provider for notification configurations and variable sets.
pub struct TfeProvider {
    notification_configurations: Reconciler<NotificationConfigurationResource>,
    variable_sets: Reconciler<VariableSetResource>,
    settings: RwLock<Option<ResolvedConfig>>,
    env: EnvLookup,
}

impl TfeProvider {
    /// Create a provider that talks to the APIs in `client` and reads
    /// fallbacks from the process environment.
    pub fn new(client: Client) -> Self {
        Self {
            notification_configurations: Reconciler::new(NotificationConfigurationResource::new(
                client.notification_configurations,
            )),
            variable_sets: Reconciler::new(VariableSetResource::new(client.variable_sets)),
            settings: RwLock::new(None),
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Use a fixed set of environment variables instead of the process
    /// environment.
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.env = Arc::new(move |name| vars.get(name).cloned());
        self
    }

    /// The settings in effect, once configured.
    pub async fn settings(&self) -> Result<ResolvedConfig, ProviderError> {
        self.settings
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }

    /// Fill a missing variable set `organization` from `default_organization`.
    async fn with_organization(&self, mut state: Value) -> Result<Value, ProviderError> {
        let has_organization = state
            .get("organization")
            .and_then(Value::as_str)
            .is_some_and(|org| !org.is_empty());
        if has_organization {
            return Ok(state);
        }

        let organization = self.settings().await?.default_organization.ok_or_else(|| {
            ProviderError::Configuration(
                "organization must be set on the resource or as the provider's default_organization"
                    .to_string(),
            )
        })?;
        debug!(organization = %organization, "Using default organization");
        if let Value::Object(map) = &mut state {
            map.insert("organization".to_string(), Value::String(organization));
        }
        Ok(state)
    }

    /// Apply the default organization when one is already known, for
    /// validation ahead of configuration.
    async fn with_known_organization(&self, state: Value) -> Value {
        if self.settings.read().await.is_none() {
            return state;
        }
        match self.with_organization(state.clone()).await {
            Ok(filled) => filled,
            Err(_) => state,
        }
    }
}

impl std::fmt::Debug for TfeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfeProvider")
            .field("notification_configurations", &self.notification_configurations)
            .field("variable_sets", &self.variable_sets)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ProviderService for TfeProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderConfig::schema())
            .with_resource(
                notification_configuration::TYPE_NAME,
                notification_configuration::schema(),
            )
            .with_resource(variable_set::TYPE_NAME, variable_set::schema())
    }

    #[instrument(skip(self, config))]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }
        diagnostics.extend(ProviderConfig::from_value(config)?.diagnostics());
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = self.validate_provider_config(config.clone()).await?;
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let resolved = ProviderConfig::from_value(config)?.resolve_with(|name| (self.env)(name));
        if resolved.token.is_none() {
            diagnostics.push(
                Diagnostic::error("Required token could not be found")
                    .with_detail("Set token in the provider configuration or the TFE_TOKEN environment variable")
                    .with_attribute("token"),
            );
            return Ok(diagnostics);
        }
        if resolved.ssl_skip_verify {
            warn!(hostname = %resolved.hostname, "TLS certificate verification is disabled");
        }

        info!(hostname = %resolved.hostname, "Configured provider");
        *self.settings.write().await = Some(resolved);
        Ok(diagnostics)
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match resource_type {
            notification_configuration::TYPE_NAME => Ok(diagnose(
                &self.notification_configurations,
                &notification_configuration::schema(),
                &config,
            )),
            variable_set::TYPE_NAME => {
                let config = self.with_known_organization(config).await;
                Ok(diagnose(&self.variable_sets, &variable_set::schema(), &config))
            }
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.settings().await?;
        match resource_type {
            notification_configuration::TYPE_NAME => {
                create_as(
                    &self.notification_configurations,
                    &notification_configuration::schema(),
                    &planned_state,
                )
                .await
            }
            variable_set::TYPE_NAME => {
                let planned_state = self.with_organization(planned_state).await?;
                create_as(&self.variable_sets, &variable_set::schema(), &planned_state).await
            }
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.settings().await?;
        match resource_type {
            notification_configuration::TYPE_NAME => {
                read_as(
                    &self.notification_configurations,
                    &notification_configuration::schema(),
                    &current_state,
                )
                .await
            }
            variable_set::TYPE_NAME => {
                read_as(&self.variable_sets, &variable_set::schema(), &current_state).await
            }
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.settings().await?;
        match resource_type {
            notification_configuration::TYPE_NAME => {
                update_as(
                    &self.notification_configurations,
                    &notification_configuration::schema(),
                    &prior_state,
                    &planned_state,
                )
                .await
            }
            variable_set::TYPE_NAME => {
                let planned_state = self.with_organization(planned_state).await?;
                update_as(
                    &self.variable_sets,
                    &variable_set::schema(),
                    &prior_state,
                    &planned_state,
                )
                .await
            }
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.settings().await?;
        let id = state_id(&current_state)?;
        match resource_type {
            notification_configuration::TYPE_NAME => self.notification_configurations.delete(&id).await,
            variable_set::TYPE_NAME => self.variable_sets.delete(&id).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.settings().await?;
        let state = match resource_type {
            notification_configuration::TYPE_NAME => {
                import_as(&self.notification_configurations, id).await?
            }
            variable_set::TYPE_NAME => import_as(&self.variable_sets, id).await?,
            other => return Err(ProviderError::UnknownResource(other.to_string())),
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}

// =========================================================================
// JSON <-> typed state
// =========================================================================

/// Schema diagnostics plus, when the value decodes, the field rules.
fn diagnose<R>(reconciler: &Reconciler<R>, schema: &Schema, value: &Value) -> Vec<Diagnostic>
where
    R: Reconcile,
    R::Config: DeserializeOwned,
{
    let mut diagnostics = validation::validate(schema, value);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return diagnostics;
    }
    // Values that only become known at apply time may not decode yet
    if let Ok(config) = serde_json::from_value::<R::Config>(value.clone()) {
        if let Err(err) = reconciler.resource().validate(&config) {
            diagnostics.push(Diagnostic::from(&err));
        }
    }
    diagnostics
}

fn decode<C: DeserializeOwned>(schema: &Schema, value: &Value) -> Result<C, ProviderError> {
    if let Err(diagnostics) = validation::validate_result(schema, value) {
        let errors: Vec<String> = diagnostics
            .into_iter()
            .map(|d| match d.detail {
                Some(detail) => format!("{}: {}", d.summary, detail),
                None => d.summary,
            })
            .collect();
        return Err(ProviderError::InvalidRequest(errors.join("; ")));
    }
    Ok(serde_json::from_value(value.clone())?)
}

fn state_id(state: &Value) -> Result<String, ProviderError> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidRequest("state has no id".to_string()))
}

fn decode_tracked<C: DeserializeOwned>(schema: &Schema, state: &Value) -> Result<Tracked<C>, ProviderError> {
    Ok(Tracked::new(state_id(state)?, decode(schema, state)?))
}

fn encode<C: Serialize>(tracked: &Tracked<C>) -> Result<Value, ProviderError> {
    let mut state = serde_json::to_value(&tracked.config)?;
    match &mut state {
        Value::Object(map) => {
            map.insert("id".to_string(), Value::String(tracked.id.clone()));
            Ok(state)
        }
        _ => Err(ProviderError::InvalidRequest(
            "configuration did not encode as an object".to_string(),
        )),
    }
}

async fn create_as<R>(
    reconciler: &Reconciler<R>,
    schema: &Schema,
    planned: &Value,
) -> Result<Value, ProviderError>
where
    R: Reconcile,
    R::Config: Serialize + DeserializeOwned,
{
    let config: R::Config = decode(schema, planned)?;
    encode(&reconciler.create(&config).await?)
}

async fn read_as<R>(
    reconciler: &Reconciler<R>,
    schema: &Schema,
    current: &Value,
) -> Result<Option<Value>, ProviderError>
where
    R: Reconcile,
    R::Config: Serialize + DeserializeOwned,
{
    let tracked = decode_tracked(schema, current)?;
    match reconciler.read(&tracked).await? {
        ReadOutcome::Present(tracked) => Ok(Some(encode(&tracked)?)),
        ReadOutcome::Absent => Ok(None),
    }
}

async fn update_as<R>(
    reconciler: &Reconciler<R>,
    schema: &Schema,
    prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError>
where
    R: Reconcile,
    R::Config: Serialize + DeserializeOwned,
{
    let prior = decode_tracked(schema, prior)?;
    let config: R::Config = decode(schema, planned)?;
    encode(&reconciler.update(&prior, &config).await?)
}

async fn import_as<R>(reconciler: &Reconciler<R>, id: &str) -> Result<Value, ProviderError>
where
    R: Reconcile,
    R::Config: Serialize,
{
    match reconciler.import(id).await? {
        ReadOutcome::Present(tracked) => encode(&tracked),
        ReadOutcome::Absent => Err(ProviderError::NotFound(format!(
            "cannot import non-existent {} {}",
            R::KIND,
            id
        ))),
    }
}
