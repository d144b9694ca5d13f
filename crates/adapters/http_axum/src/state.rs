//! Shared application state for axum handlers.

use std::sync::Arc;

use areaflow_app::capability::CapabilityCatalog;
use areaflow_app::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use areaflow_app::services::AppletService;
use areaflow_app::trigger::TriggerRegistry;
use areaflow_app::webhook_broker::WebhookBroker;

/// Application state shared across all axum handlers.
///
/// Generic over the repository, capability catalog and log factory to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<R, C, L> {
    /// Applet CRUD service.
    pub applet_service: Arc<AppletService<R, C, L>>,
    /// Live trigger table.
    pub registry: Arc<TriggerRegistry<R, C, L>>,
    /// Inbound webhook hand-off and history.
    pub broker: Arc<WebhookBroker>,
}

impl<R, C, L> Clone for AppState<R, C, L> {
    fn clone(&self) -> Self {
        Self {
            applet_service: Arc::clone(&self.applet_service),
            registry: Arc::clone(&self.registry),
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<R, C, L> AppState<R, C, L>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    /// Create a new application state around a shared registry.
    ///
    /// The registry is also handed to background tasks (startup loading,
    /// shutdown), hence the `Arc`.
    pub fn new(registry: Arc<TriggerRegistry<R, C, L>>) -> Self {
        Self {
            applet_service: Arc::new(AppletService::new(Arc::clone(&registry))),
            broker: Arc::clone(registry.broker()),
            registry,
        }
    }
}
