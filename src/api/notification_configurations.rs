use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{UserRef, WorkspaceRef};
use crate::error::{ApiError, ValidationError};

/// The payload format of a notification configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationType {
    /// Email to users and/or addresses.
    Email,
    /// A JSON payload posted to an arbitrary URL.
    Generic,
    /// A Slack incoming webhook.
    Slack,
    /// A Microsoft Teams incoming webhook.
    MicrosoftTeams,
}

impl DestinationType {
    /// Every destination type.
    pub const ALL: [DestinationType; 4] = [
        DestinationType::Email,
        DestinationType::Generic,
        DestinationType::Slack,
        DestinationType::MicrosoftTeams,
    ];

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Generic => "generic",
            Self::Slack => "slack",
            Self::MicrosoftTeams => "microsoft-teams",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "destination_type",
                detail: format!("unknown destination type {:?}", s),
            })
    }
}

/// A run event that fires a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trigger {
    /// A run was created.
    #[serde(rename = "run:created")]
    Created,
    /// A run started planning.
    #[serde(rename = "run:planning")]
    Planning,
    /// A run needs confirmation or a policy override.
    #[serde(rename = "run:needs_attention")]
    NeedsAttention,
    /// A run started applying.
    #[serde(rename = "run:applying")]
    Applying,
    /// A run completed.
    #[serde(rename = "run:completed")]
    Completed,
    /// A run errored.
    #[serde(rename = "run:errored")]
    Errored,
}

impl Trigger {
    /// Every trigger.
    pub const ALL: [Trigger; 6] = [
        Trigger::Created,
        Trigger::Planning,
        Trigger::NeedsAttention,
        Trigger::Applying,
        Trigger::Completed,
        Trigger::Errored,
    ];

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "run:created",
            Self::Planning => "run:planning",
            Self::NeedsAttention => "run:needs_attention",
            Self::Applying => "run:applying",
            Self::Completed => "run:completed",
            Self::Errored => "run:errored",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification configuration as returned by the API.
///
/// The API never returns the write-only token, so there is no field for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfiguration {
    /// Server-assigned identifier (`nc-...`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Payload format.
    pub destination_type: DestinationType,
    /// Whether notifications are delivered.
    pub enabled: bool,
    /// Email recipients by address.
    #[serde(default)]
    pub email_addresses: Vec<String>,
    /// Email recipients by user. The API embeds more than the identifier.
    #[serde(default)]
    pub email_users: Vec<UserRef>,
    /// Run events that fire a notification.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Delivery URL. Empty for email destinations.
    #[serde(default)]
    pub url: String,
    /// The workspace the configuration belongs to.
    pub subscribable: WorkspaceRef,
}

/// Options for creating a notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfigurationCreateOptions {
    /// Payload format.
    pub destination_type: DestinationType,
    /// Whether notifications are delivered.
    pub enabled: bool,
    /// Display name.
    pub name: String,
    /// Write-only verification token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Delivery URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Run events that fire a notification.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Email recipients by address.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    /// Email recipients by user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_users: Vec<UserRef>,
}

/// Options for updating a notification configuration.
///
/// The destination type cannot change in place, so it is absent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfigurationUpdateOptions {
    /// Whether notifications are delivered.
    pub enabled: bool,
    /// Display name.
    pub name: String,
    /// Write-only verification token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Delivery URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Run events that fire a notification.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Email recipients by address.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    /// Email recipients by user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_users: Vec<UserRef>,
}

/// Notification configuration endpoints.
#[async_trait]
pub trait NotificationConfigurations: Send + Sync {
    /// Create a notification configuration on a workspace.
    async fn create(
        &self,
        workspace_id: &str,
        options: NotificationConfigurationCreateOptions,
    ) -> Result<NotificationConfiguration, ApiError>;

    /// Read a notification configuration by identifier.
    async fn read(&self, id: &str) -> Result<NotificationConfiguration, ApiError>;

    /// Update a notification configuration.
    async fn update(
        &self,
        id: &str,
        options: NotificationConfigurationUpdateOptions,
    ) -> Result<NotificationConfiguration, ApiError>;

    /// Delete a notification configuration.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
