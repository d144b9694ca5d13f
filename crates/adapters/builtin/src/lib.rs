//! # areaflow-adapter-builtin
//!
//! Capabilities shipped with the server, registered under their
//! `service:name` reference.
//!
//! ## Responsibilities
//! - `webhook:applet_triggered` — action fed by the webhook broker
//! - `webhook:history_updated` — action firing when the webhook history grows
//! - `webhook:trigger_webhook` — reaction sending an outbound HTTP request
//! - `time:wait_time` — action firing once a configured delay has elapsed
//! - `time:every_time` — action firing on matching calendar minutes
//! - `time:time_reaction_calculate_time` — reaction logging the time between two dates
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for the capability contract and the broker)
//! and `areaflow-domain`. Outbound HTTP goes through `reqwest`.

pub mod template;
pub mod time;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use areaflow_app::capability::CapabilitySet;
use areaflow_app::webhook_broker::WebhookBroker;

/// Tunables of the built-in capabilities.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOptions {
    /// Bounded wait of one `webhook:applet_triggered` poll.
    pub webhook_read_timeout: Duration,
    /// Timeout of outbound requests made by `webhook:trigger_webhook`.
    pub http_timeout: Duration,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            webhook_read_timeout: Duration::from_secs(2),
            http_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to build HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Build the catalog of every built-in capability.
///
/// # Errors
///
/// Returns [`CatalogError::HttpClient`] if the outbound HTTP client cannot
/// be initialised.
pub fn catalog(
    broker: &Arc<WebhookBroker>,
    options: BuiltinOptions,
) -> Result<CapabilitySet, CatalogError> {
    let client = reqwest::Client::builder()
        .timeout(options.http_timeout)
        .build()?;
    Ok(CapabilitySet::new()
        .with(
            webhook::AppletTriggered::spec(),
            webhook::AppletTriggered::new(Arc::clone(broker), options.webhook_read_timeout),
        )
        .with(
            webhook::HistoryUpdated::spec(),
            webhook::HistoryUpdated::new(Arc::clone(broker)),
        )
        .with(
            webhook::TriggerWebhook::spec(),
            webhook::TriggerWebhook::new(client),
        )
        .with(time::WaitTime::spec(), time::WaitTime)
        .with(time::EveryTime::spec(), time::EveryTime)
        .with(
            time::CalculateTimeDifference::spec(),
            time::CalculateTimeDifference,
        ))
}

#[cfg(test)]
pub(crate) mod testing {
    use areaflow_app::ports::{AppletLog, LogLevel};

    pub(crate) struct NullLog;

    impl AppletLog for NullLog {
        fn write(&self, _level: LogLevel, _message: &str, _echo: bool) {}
        fn flush(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_app::capability::CapabilityCatalog;
    use areaflow_domain::applet::{AreaRef, Side};
    use areaflow_domain::webhook::WebhookMode;

    #[test]
    fn should_expose_every_builtin_capability_on_its_side() {
        let catalog = catalog(&Arc::new(WebhookBroker::default()), BuiltinOptions::default()).unwrap();

        for (area, side) in [
            ("webhook:applet_triggered", Side::Action),
            ("webhook:history_updated", Side::Action),
            ("webhook:trigger_webhook", Side::Reaction),
            ("time:wait_time", Side::Action),
            ("time:every_time", Side::Action),
            ("time:time_reaction_calculate_time", Side::Reaction),
        ] {
            let area: AreaRef = area.parse().unwrap();
            assert!(catalog.resolve(&area, side).is_ok(), "{area} missing");
        }
    }

    #[test]
    fn should_mark_only_applet_triggered_as_webhook_driven() {
        let catalog = catalog(&Arc::new(WebhookBroker::default()), BuiltinOptions::default()).unwrap();

        let webhook_driven: Vec<String> = catalog
            .specs()
            .filter(|spec| spec.webhook == Some(WebhookMode::AppletTrigger))
            .map(|spec| spec.area.to_string())
            .collect();

        assert_eq!(webhook_driven, vec!["webhook:applet_triggered"]);
    }
}
