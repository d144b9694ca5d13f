//! Storage port — repository traits for persistence.

use std::future::Future;
use std::sync::Arc;

use areaflow_domain::applet::{Applet, AppletStatus};
use areaflow_domain::authorization::Authorization;
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::{AppletId, AuthorizationId};

/// Repository for persisting and querying [`Applet`]s.
///
/// The scheduler only ever writes back the `active` flag and the run
/// `status`; everything else is owned by the applet use-cases.
pub trait AppletRepository: Send + Sync {
    /// Create a new applet in storage.
    fn create(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send;

    /// Get an applet by its unique identifier.
    fn get_by_id(
        &self,
        id: AppletId,
    ) -> impl Future<Output = Result<Option<Applet>, AreaFlowError>> + Send;

    /// Get all applets.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send;

    /// Get every applet that is complete enough to be scheduled at startup.
    fn get_runnable(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send;

    /// Update an existing applet.
    fn update(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send;

    /// Delete an applet by its unique identifier.
    fn delete(&self, id: AppletId) -> impl Future<Output = Result<(), AreaFlowError>> + Send;

    /// Persist the pause flag.
    fn set_active(
        &self,
        id: AppletId,
        active: bool,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send;

    /// Persist the last known run status.
    fn set_status(
        &self,
        id: AppletId,
        status: AppletStatus,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send;
}

/// Read access to stored third-party credentials.
pub trait AuthorizationRepository: Send + Sync {
    fn create(
        &self,
        authorization: Authorization,
    ) -> impl Future<Output = Result<Authorization, AreaFlowError>> + Send;

    fn get_by_id(
        &self,
        id: AuthorizationId,
    ) -> impl Future<Output = Result<Option<Authorization>, AreaFlowError>> + Send;
}

impl<T: AppletRepository> AppletRepository for Arc<T> {
    fn create(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send {
        (**self).create(applet)
    }

    fn get_by_id(
        &self,
        id: AppletId,
    ) -> impl Future<Output = Result<Option<Applet>, AreaFlowError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send {
        (**self).get_all()
    }

    fn get_runnable(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send {
        (**self).get_runnable()
    }

    fn update(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send {
        (**self).update(applet)
    }

    fn delete(&self, id: AppletId) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        (**self).delete(id)
    }

    fn set_active(
        &self,
        id: AppletId,
        active: bool,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        (**self).set_active(id, active)
    }

    fn set_status(
        &self,
        id: AppletId,
        status: AppletStatus,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        (**self).set_status(id, status)
    }
}

impl<T: AuthorizationRepository> AuthorizationRepository for Arc<T> {
    fn create(
        &self,
        authorization: Authorization,
    ) -> impl Future<Output = Result<Authorization, AreaFlowError>> + Send {
        (**self).create(authorization)
    }

    fn get_by_id(
        &self,
        id: AuthorizationId,
    ) -> impl Future<Output = Result<Option<Authorization>, AreaFlowError>> + Send {
        (**self).get_by_id(id)
    }
}
