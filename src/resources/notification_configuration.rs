//! `tfe_notification_configuration`: run notifications for a workspace.
//!
//! Which fields are legal depends on `destination_type`:
//!
//! | destination       | `url`     | `token`   | `email_addresses` / `email_user_ids` |
//! |-------------------|-----------|-----------|--------------------------------------|
//! | `email`           | forbidden | forbidden | allowed                              |
//! | `generic`         | required  | allowed   | forbidden                            |
//! | `slack`           | required  | forbidden | forbidden                            |
//! | `microsoft-teams` | required  | forbidden | forbidden                            |
//!
//! `token` is write-only: the API never returns it, so reads keep whatever
//! value was last written.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_set, non_empty, null_as_default};
pub use crate::api::{DestinationType, Trigger};
use crate::api::{
    NotificationConfiguration, NotificationConfigurationCreateOptions,
    NotificationConfigurationUpdateOptions, NotificationConfigurations, UserRef,
};
use crate::error::{ApiError, ValidationError};
use crate::reconcile::Reconcile;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "tfe_notification_configuration";

/// How `destination_type` reads in validation messages.
const DISCRIMINANT_NAME: &str = "destination type";

static ID_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^nc-[a-zA-Z0-9]{16}$").expect("identifier pattern compiles"));

/// Desired state of a notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfigurationConfig {
    /// Display name.
    pub name: String,
    /// Payload format. Cannot change in place.
    pub destination_type: DestinationType,
    /// Email recipients by address. `email` only.
    #[serde(default, deserialize_with = "null_as_default")]
    pub email_addresses: BTreeSet<String>,
    /// Email recipients by user ID. `email` only.
    #[serde(default, deserialize_with = "null_as_default")]
    pub email_user_ids: BTreeSet<String>,
    /// Whether notifications are delivered.
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// Write-only verification token. `generic` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Run events that fire a notification.
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: BTreeSet<Trigger>,
    /// Delivery URL. Required unless `email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Owning workspace. Cannot change in place.
    pub workspace_id: String,
}

impl NotificationConfigurationConfig {
    /// A disabled configuration with no recipients, URL or triggers.
    pub fn new(
        name: impl Into<String>,
        destination_type: DestinationType,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            destination_type,
            email_addresses: BTreeSet::new(),
            email_user_ids: BTreeSet::new(),
            enabled: false,
            token: None,
            triggers: BTreeSet::new(),
            url: None,
            workspace_id: workspace_id.into(),
        }
    }

    /// Set the delivery URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the verification token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the email addresses.
    pub fn with_email_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.email_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Set the email user IDs.
    pub fn with_email_user_ids<I, S>(mut self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.email_user_ids = user_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the triggers.
    pub fn with_triggers(mut self, triggers: impl IntoIterator<Item = Trigger>) -> Self {
        self.triggers = triggers.into_iter().collect();
        self
    }

    /// Enable or disable delivery.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// =========================================================================
// Field Validator
// =========================================================================

/// Check the destination-type field rules. Stops at the first violation.
pub fn validate(config: &NotificationConfigurationConfig) -> Result<(), ValidationError> {
    let destination = config.destination_type;
    let emails_set = !config.email_addresses.is_empty();
    let email_users_set = !config.email_user_ids.is_empty();

    match destination {
        DestinationType::Email => {
            forbid(destination, "url", is_set(&config.url))?;
            forbid(destination, "token", is_set(&config.token))?;
        }
        DestinationType::Generic => {
            forbid(destination, "email_addresses", emails_set)?;
            forbid(destination, "email_user_ids", email_users_set)?;
            require(destination, "url", is_set(&config.url))?;
        }
        DestinationType::Slack | DestinationType::MicrosoftTeams => {
            forbid(destination, "email_addresses", emails_set)?;
            forbid(destination, "email_user_ids", email_users_set)?;
            forbid(destination, "token", is_set(&config.token))?;
            require(destination, "url", is_set(&config.url))?;
        }
    }
    Ok(())
}

fn forbid(
    destination: DestinationType,
    field: &'static str,
    is_set: bool,
) -> Result<(), ValidationError> {
    if is_set {
        return Err(ValidationError::Forbidden {
            field,
            discriminant_name: DISCRIMINANT_NAME,
            discriminant: destination.as_str(),
        });
    }
    Ok(())
}

fn require(
    destination: DestinationType,
    field: &'static str,
    is_set: bool,
) -> Result<(), ValidationError> {
    if !is_set {
        return Err(ValidationError::Required {
            field,
            discriminant_name: DISCRIMINANT_NAME,
            discriminant: destination.as_str(),
        });
    }
    Ok(())
}

// =========================================================================
// Request Mapper
// =========================================================================

/// Options for creating the configured notification. Unset strings are omitted.
pub fn create_options(config: &NotificationConfigurationConfig) -> NotificationConfigurationCreateOptions {
    NotificationConfigurationCreateOptions {
        destination_type: config.destination_type,
        enabled: config.enabled,
        name: config.name.clone(),
        token: config.token.clone().filter(|t| !t.is_empty()),
        url: config.url.clone().filter(|u| !u.is_empty()),
        triggers: config.triggers.iter().copied().collect(),
        email_addresses: config.email_addresses.iter().cloned().collect(),
        email_users: user_refs(config),
    }
}

/// Options for updating to the configured state.
///
/// Every scalar is sent; unset `token` and `url` go out as empty strings so
/// that removing them from configuration clears them remotely.
pub fn update_options(config: &NotificationConfigurationConfig) -> NotificationConfigurationUpdateOptions {
    NotificationConfigurationUpdateOptions {
        enabled: config.enabled,
        name: config.name.clone(),
        token: Some(config.token.clone().unwrap_or_default()),
        url: Some(config.url.clone().unwrap_or_default()),
        triggers: config.triggers.iter().copied().collect(),
        email_addresses: config.email_addresses.iter().cloned().collect(),
        email_users: user_refs(config),
    }
}

fn user_refs(config: &NotificationConfigurationConfig) -> Vec<UserRef> {
    config.email_user_ids.iter().map(UserRef::new).collect()
}

// =========================================================================
// Response Projector
// =========================================================================

/// Project an API entity into configuration-shaped state.
///
/// The token comes from `prior`; an empty URL stays unset.
pub fn project(
    remote: &NotificationConfiguration,
    prior: Option<&NotificationConfigurationConfig>,
) -> NotificationConfigurationConfig {
    NotificationConfigurationConfig {
        name: remote.name.clone(),
        destination_type: remote.destination_type,
        email_addresses: remote.email_addresses.iter().cloned().collect(),
        email_user_ids: remote.email_users.iter().map(|u| u.id.clone()).collect(),
        enabled: remote.enabled,
        token: prior.and_then(|p| p.token.clone()),
        triggers: remote.triggers.iter().copied().collect(),
        url: non_empty(&remote.url),
        workspace_id: remote.subscribable.id.clone(),
    }
}

// =========================================================================
// Schema
// =========================================================================

/// Schema of `tfe_notification_configuration`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description(
            "Sends notifications for run state transitions of a workspace to a URL, \
             a chat webhook or email recipients.",
        )
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Notification configuration ID."),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the notification configuration."),
        )
        .with_attribute(
            "destination_type",
            Attribute::required_string()
                .with_allowed_values(DestinationType::ALL.iter().map(|d| d.as_str()))
                .with_force_new()
                .with_description("The type of notification payload to send."),
        )
        .with_attribute(
            "email_addresses",
            Attribute::optional_string_set()
                .computed()
                .with_description("Email addresses to notify. Only for `email` destinations."),
        )
        .with_attribute(
            "email_user_ids",
            Attribute::optional_string_set()
                .computed()
                .with_description("IDs of users to notify. Only for `email` destinations."),
        )
        .with_attribute(
            "enabled",
            Attribute::optional_bool()
                .with_default(serde_json::Value::Bool(false))
                .with_description("Whether notifications are delivered. Defaults to `false`."),
        )
        .with_attribute(
            "token",
            Attribute::optional_string()
                .sensitive()
                .with_description("Write-only token the receiver can use to verify requests. Only for `generic` destinations."),
        )
        .with_attribute(
            "triggers",
            Attribute::optional_string_set()
                .with_allowed_values(Trigger::ALL.iter().map(|t| t.as_str()))
                .with_description("Run events that send a notification."),
        )
        .with_attribute(
            "url",
            Attribute::optional_string().with_description(
                "URL notifications are posted to. Required unless the destination is `email`.",
            ),
        )
        .with_attribute(
            "workspace_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("ID of the workspace that owns the notification configuration."),
        )
}

// =========================================================================
// Reconciliation
// =========================================================================

/// Notification configurations, reconciled against the given API.
#[derive(Clone)]
pub struct NotificationConfigurationResource {
    api: Arc<dyn NotificationConfigurations>,
}

impl NotificationConfigurationResource {
    /// Reconcile against `api`.
    pub fn new(api: Arc<dyn NotificationConfigurations>) -> Self {
        Self { api }
    }
}

impl fmt::Debug for NotificationConfigurationResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfigurationResource")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Reconcile for NotificationConfigurationResource {
    type Config = NotificationConfigurationConfig;
    type Remote = NotificationConfiguration;

    const TYPE_NAME: &'static str = TYPE_NAME;
    const KIND: &'static str = "notification configuration";

    fn validate(&self, config: &Self::Config) -> Result<(), ValidationError> {
        validate(config)
    }

    fn describe(&self, config: &Self::Config) -> String {
        config.name.clone()
    }

    fn is_valid_id(&self, id: &str) -> bool {
        ID_FORMAT.is_match(id)
    }

    fn remote_id(remote: &Self::Remote) -> &str {
        &remote.id
    }

    fn project(&self, remote: &Self::Remote, prior: Option<&Self::Config>) -> Self::Config {
        project(remote, prior)
    }

    fn replacement_field(&self, prior: &Self::Config, config: &Self::Config) -> Option<&'static str> {
        if prior.workspace_id != config.workspace_id {
            Some("workspace_id")
        } else if prior.destination_type != config.destination_type {
            Some("destination_type")
        } else {
            None
        }
    }

    async fn create_remote(&self, config: &Self::Config) -> Result<Self::Remote, ApiError> {
        self.api
            .create(&config.workspace_id, create_options(config))
            .await
    }

    async fn read_remote(&self, id: &str) -> Result<Self::Remote, ApiError> {
        self.api.read(id).await
    }

    async fn update_remote(&self, id: &str, config: &Self::Config) -> Result<Self::Remote, ApiError> {
        self.api.update(id, update_options(config)).await
    }

    async fn delete_remote(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(id).await
    }
}
