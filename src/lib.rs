//! TFE Provider
//!
//! Keeps notification configurations and variable sets on a Terraform
//! Cloud/Enterprise server in line with their declared configuration.
//!
//! # Overview
//!
//! - **Resources**: typed configuration, field rules, request mapping and
//!   response projection for `tfe_notification_configuration` and
//!   `tfe_variable_set` ([`resources`])
//! - **Reconciliation**: the create/read/update/delete/import contract shared
//!   by every resource kind ([`reconcile`])
//! - **API traits**: the remote calls the resources need ([`api`]); the HTTP
//!   transport implements them outside this crate
//! - **ProviderService**: the JSON-level boundary a host drives
//!   ([`TfeProvider`]), with schema validation and planning
//! - **Error types**, **configuration** and **logging** via `tracing`
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tfe_provider::{init_logging, Client, ProviderService, TfeProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let token = std::env::var("TFE_TOKEN")?;
//!     let api = Arc::new(MyHttpApi::new());
//!     let provider = TfeProvider::new(Client::from_backend(api));
//!     provider
//!         .configure(serde_json::json!({"token": token, "default_organization": "acme"}))
//!         .await?;
//!
//!     let state = provider
//!         .create("tfe_variable_set", serde_json::json!({
//!             "name": "shared",
//!             "workspace_ids": ["ws-abc123"],
//!         }))
//!         .await?;
//!     tracing::info!(id = %state["id"], "created");
//!     Ok(())
//! }
//! ```
//!
//! # Typed use
//!
//! The reconcilers can be used without JSON:
//!
//! ```ignore
//! use tfe_provider::reconcile::Reconciler;
//! use tfe_provider::resources::{VariableSetConfig, VariableSetResource};
//!
//! let reconciler = Reconciler::new(VariableSetResource::new(client.variable_sets.clone()));
//! let tracked = reconciler
//!     .create(&VariableSetConfig::new("shared", "acme").with_workspace_ids(["ws-a"]))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use api::Client;
pub use config::{ProviderConfig, ResolvedConfig};
pub use error::{ApiError, ProviderError, ValidationError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::TfeProvider;
pub use reconcile::{ReadOutcome, Reconcile, Reconciler, Tracked};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
