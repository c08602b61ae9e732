//! The reconciliation contract shared by every resource kind.
//!
//! A resource kind implements [`Reconcile`]: its field validator, its response
//! projector, and thin wrappers around its remote calls (which run the request
//! mapper). [`Reconciler`] drives the lifecycle on top of that:
//!
//! ```text
//! absent --create--> present --read/update--> present --delete--> absent
//! ```
//!
//! - **Create** validates, creates, runs the follow-up association call if the
//!   creation request could not carry the associations, then reads the entity
//!   back so the returned state mirrors the server.
//! - **Read** fetches by identifier. A missing entity is not an error: it
//!   yields [`ReadOutcome::Absent`].
//! - **Update** re-validates, sends the scalar update, then the association
//!   update if the association set changed. The first failure aborts.
//! - **Delete** removes the entity. Deleting a missing entity succeeds.
//!
//! Remote failures are wrapped with the operation, the resource kind and the
//! identifier (or name) and returned as-is; nothing is retried here.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Operation, ProviderError, ValidationError};

/// A configuration record together with the identifier of the remote entity
/// it is reconciled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracked<C> {
    /// Server-assigned identifier.
    pub id: String,
    /// The configuration-shaped state.
    pub config: C,
}

impl<C> Tracked<C> {
    /// Pair a configuration with an identifier.
    pub fn new(id: impl Into<String>, config: C) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}

/// The result of reading a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<C> {
    /// The entity exists; its projected state.
    Present(Tracked<C>),
    /// The entity no longer exists. The identifier should be forgotten.
    Absent,
}

impl<C> ReadOutcome<C> {
    /// Whether the entity was gone.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The projected state, if the entity exists.
    pub fn into_present(self) -> Option<Tracked<C>> {
        match self {
            Self::Present(tracked) => Some(tracked),
            Self::Absent => None,
        }
    }
}

/// One resource kind's half of the reconciliation contract.
///
/// The `*_remote` methods perform exactly one API call each and return the
/// collaborator's error unchanged; [`Reconciler`] adds the context.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Statically-typed desired state.
    type Config: Clone + PartialEq + std::fmt::Debug + Send + Sync;
    /// The entity as returned by the API.
    type Remote: Send + Sync;

    /// Resource type name, e.g. `tfe_variable_set`.
    const TYPE_NAME: &'static str;
    /// Human-readable kind used in messages, e.g. `variable set`.
    const KIND: &'static str;

    /// Check the cross-field rules of a configuration.
    fn validate(&self, config: &Self::Config) -> Result<(), ValidationError>;

    /// What to call an entity before it has an identifier.
    fn describe(&self, config: &Self::Config) -> String;

    /// Whether an identifier has this kind's format.
    fn is_valid_id(&self, id: &str) -> bool;

    /// The identifier of a remote entity.
    fn remote_id(remote: &Self::Remote) -> &str;

    /// Project a remote entity into configuration-shaped state. `prior` is the
    /// previously held state, if any, for fields the API never returns.
    fn project(&self, remote: &Self::Remote, prior: Option<&Self::Config>) -> Self::Config;

    /// The first field that differs between `prior` and `config` and cannot be
    /// changed in place.
    fn replacement_field(&self, prior: &Self::Config, config: &Self::Config)
        -> Option<&'static str>;

    /// Whether the scalar update call should be issued.
    ///
    /// Defaults to always sending every scalar.
    fn scalars_changed(&self, prior: &Self::Config, config: &Self::Config) -> bool {
        let _ = (prior, config);
        true
    }

    /// Whether the association set differs from the prior state.
    fn associations_changed(&self, prior: &Self::Config, config: &Self::Config) -> bool {
        let _ = (prior, config);
        false
    }

    /// Whether a freshly created entity still needs its associations applied.
    fn needs_association_after_create(&self, config: &Self::Config) -> bool {
        let _ = config;
        false
    }

    /// Create the entity.
    async fn create_remote(&self, config: &Self::Config) -> Result<Self::Remote, ApiError>;

    /// Read the entity by identifier.
    async fn read_remote(&self, id: &str) -> Result<Self::Remote, ApiError>;

    /// Send the scalar update.
    async fn update_remote(&self, id: &str, config: &Self::Config)
        -> Result<Self::Remote, ApiError>;

    /// Replace the association set.
    ///
    /// Only called when [`Reconcile::associations_changed`] or
    /// [`Reconcile::needs_association_after_create`] says so.
    async fn update_associations_remote(
        &self,
        id: &str,
        config: &Self::Config,
    ) -> Result<Self::Remote, ApiError> {
        let _ = (id, config);
        Err(ApiError::Other(format!(
            "{} has no association endpoint",
            Self::KIND
        )))
    }

    /// Delete the entity.
    async fn delete_remote(&self, id: &str) -> Result<(), ApiError>;
}

/// Drives create/read/update/delete for one resource kind.
#[derive(Debug, Clone)]
pub struct Reconciler<R> {
    resource: R,
}

impl<R: Reconcile> Reconciler<R> {
    /// Wrap a resource kind.
    pub fn new(resource: R) -> Self {
        Self { resource }
    }

    /// The wrapped resource kind.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Create the entity described by `config`.
    ///
    /// The identifier is only returned once the entity has been created, its
    /// associations applied and its state read back.
    pub async fn create(&self, config: &R::Config) -> Result<Tracked<R::Config>, ProviderError> {
        self.resource.validate(config)?;

        let name = self.resource.describe(config);
        debug!(resource = R::TYPE_NAME, operation = "create", name = %name, "Create {}", R::KIND);
        let created = self
            .resource
            .create_remote(config)
            .await
            .map_err(|e| ProviderError::remote(Operation::Create, R::KIND, name.as_str(), e))?;
        let id = R::remote_id(&created).to_string();

        if self.resource.needs_association_after_create(config) {
            debug!(
                resource = R::TYPE_NAME,
                operation = "update_associations",
                id = %id,
                "Apply associations after create"
            );
            if let Err(e) = self.resource.update_associations_remote(&id, config).await {
                warn!(
                    resource = R::TYPE_NAME,
                    operation = "update_associations",
                    id = %id,
                    error = %e,
                    "Created entity is left untracked because its associations could not be applied"
                );
                return Err(ProviderError::remote(
                    Operation::UpdateAssociations,
                    R::KIND,
                    id,
                    e,
                ));
            }
        }

        let tracked = self.settle(Operation::Create, &id, config).await?;
        info!(resource = R::TYPE_NAME, operation = "create", id = %tracked.id, "Created {}", R::KIND);
        Ok(tracked)
    }

    /// Refresh a tracked entity from the API.
    pub async fn read(
        &self,
        tracked: &Tracked<R::Config>,
    ) -> Result<ReadOutcome<R::Config>, ProviderError> {
        self.fetch(&tracked.id, Some(&tracked.config)).await
    }

    /// Read an entity that has no local state yet.
    ///
    /// Produces the same state a normal read would, except for write-only
    /// fields, which stay unset.
    pub async fn import(&self, id: &str) -> Result<ReadOutcome<R::Config>, ProviderError> {
        if !self.resource.is_valid_id(id) {
            return Err(ProviderError::InvalidId(format!(
                "{:?} is not a valid {} identifier",
                id,
                R::KIND
            )));
        }
        self.fetch(id, None).await
    }

    /// Bring the remote entity in line with `config`.
    ///
    /// Scalars are sent before associations; if the scalar update fails the
    /// association update is not attempted.
    pub async fn update(
        &self,
        prior: &Tracked<R::Config>,
        config: &R::Config,
    ) -> Result<Tracked<R::Config>, ProviderError> {
        self.resource.validate(config)?;
        if let Some(field) = self.resource.replacement_field(&prior.config, config) {
            return Err(ProviderError::InvalidRequest(format!(
                "{} cannot be changed in place; the {} {} must be replaced",
                field,
                R::KIND,
                prior.id
            )));
        }

        let id = prior.id.as_str();
        if self.resource.scalars_changed(&prior.config, config) {
            debug!(resource = R::TYPE_NAME, operation = "update", id = %id, "Update {}", R::KIND);
            self.resource
                .update_remote(id, config)
                .await
                .map_err(|e| ProviderError::remote(Operation::Update, R::KIND, id, e))?;
        }

        if self.resource.associations_changed(&prior.config, config) {
            debug!(
                resource = R::TYPE_NAME,
                operation = "update_associations",
                id = %id,
                "Replace associations of {}",
                R::KIND
            );
            self.resource
                .update_associations_remote(id, config)
                .await
                .map_err(|e| {
                    ProviderError::remote(Operation::UpdateAssociations, R::KIND, id, e)
                })?;
        }

        let tracked = self.settle(Operation::Update, id, config).await?;
        info!(resource = R::TYPE_NAME, operation = "update", id = %id, "Updated {}", R::KIND);
        Ok(tracked)
    }

    /// Delete the entity. An entity that is already gone counts as deleted.
    pub async fn delete(&self, id: &str) -> Result<(), ProviderError> {
        debug!(resource = R::TYPE_NAME, operation = "delete", id = %id, "Delete {}", R::KIND);
        match self.resource.delete_remote(id).await {
            Ok(()) => {
                info!(resource = R::TYPE_NAME, operation = "delete", id = %id, "Deleted {}", R::KIND);
                Ok(())
            }
            Err(ApiError::NotFound) => {
                debug!(resource = R::TYPE_NAME, operation = "delete", id = %id, "{} was already gone", R::KIND);
                Ok(())
            }
            Err(e) => Err(ProviderError::remote(Operation::Delete, R::KIND, id, e)),
        }
    }

    async fn fetch(
        &self,
        id: &str,
        prior: Option<&R::Config>,
    ) -> Result<ReadOutcome<R::Config>, ProviderError> {
        debug!(resource = R::TYPE_NAME, operation = "read", id = %id, "Read {}", R::KIND);
        match self.resource.read_remote(id).await {
            Ok(remote) => Ok(ReadOutcome::Present(Tracked::new(
                R::remote_id(&remote),
                self.resource.project(&remote, prior),
            ))),
            Err(ApiError::NotFound) => {
                warn!(resource = R::TYPE_NAME, operation = "read", id = %id, "{} no longer exists", R::KIND);
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(ProviderError::remote(Operation::Read, R::KIND, id, e)),
        }
    }

    /// Read back after a write. The written configuration stands in as prior
    /// state so write-only fields survive.
    async fn settle(
        &self,
        after: Operation,
        id: &str,
        config: &R::Config,
    ) -> Result<Tracked<R::Config>, ProviderError> {
        match self.fetch(id, Some(config)).await? {
            ReadOutcome::Present(tracked) => Ok(tracked),
            ReadOutcome::Absent => Err(ProviderError::NotFound(format!(
                "{} {} vanished right after {}",
                R::KIND,
                id,
                after.as_str()
            ))),
        }
    }
}
