//! Applet service — use-cases for managing applets and their triggers.

use std::sync::Arc;

use areaflow_domain::applet::{Applet, Side};
use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::id::AppletId;

use crate::capability::CapabilityCatalog;
use crate::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use crate::trigger::TriggerRegistry;

/// Application service for applet CRUD, backed by the trigger registry so
/// that deleting an applet also retires its worker.
pub struct AppletService<R, C, L> {
    registry: Arc<TriggerRegistry<R, C, L>>,
}

impl<R, C, L> Clone for AppletService<R, C, L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R, C, L> AppletService<R, C, L>
where
    R: AppletRepository + AuthorizationRepository,
    C: CapabilityCatalog,
    L: AppletLogFactory,
{
    /// Create a new service sharing the given registry.
    pub fn new(registry: Arc<TriggerRegistry<R, C, L>>) -> Self {
        Self { registry }
    }

    /// Persist a new applet after validating it against the catalog.
    ///
    /// Does not create a trigger; see [`create_trigger`](Self::create_trigger).
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Validation`] if invariants fail or a binding
    /// misses a required setting, [`AreaFlowError::NotFound`] for an unknown
    /// capability, or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, applet), fields(applet_name = %applet.name))]
    pub async fn create_applet(&self, applet: Applet) -> Result<Applet, AreaFlowError> {
        applet.validate()?;
        let catalog = self.registry.catalog();
        catalog.check_binding(&applet.action, Side::Action)?;
        catalog.check_binding(&applet.reaction, Side::Reaction)?;
        AppletRepository::create(self.registry.repository(), applet).await
    }

    /// Look up an applet by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] when no applet with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_applet(&self, id: AppletId) -> Result<Applet, AreaFlowError> {
        AppletRepository::get_by_id(self.registry.repository(), id)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Applet",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// List all applets.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_applets(&self) -> Result<Vec<Applet>, AreaFlowError> {
        self.registry.repository().get_all().await
    }

    /// Create the trigger of a stored applet and optionally launch it.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the applet is unknown, or any
    /// error of [`TriggerRegistry::add`].
    #[tracing::instrument(skip(self))]
    pub async fn create_trigger(&self, id: AppletId, auto_start: bool) -> Result<(), AreaFlowError> {
        let applet = self.get_applet(id).await?;
        self.registry.add(&applet, auto_start).await
    }

    /// Delete an applet, stopping and removing its trigger first.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the applet is unknown, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_applet(&self, id: AppletId) -> Result<(), AreaFlowError> {
        self.get_applet(id).await?;
        match self.registry.retire(id).await {
            Ok(()) | Err(AreaFlowError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        self.registry.repository().delete(id).await
    }
}
