//! Webhook — named inbound endpoints and their delivery history.

use serde::{Deserialize, Serialize};

/// How a registered webhook endpoint is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookMode {
    /// Deliveries are handed to the applet's action one at a time.
    AppletTrigger,
    /// Deliveries only feed the shared history.
    ServiceInteraction,
}

impl WebhookMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppletTrigger => "applet_trigger",
            Self::ServiceInteraction => "service_interaction",
        }
    }
}

/// One accepted delivery, as recorded in the shared history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Number of deliveries recorded before this one.
    pub id: u64,
    /// Who sent the delivery.
    pub author: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook {name} is registered as {registered}, not {requested}")]
    ModeMismatch {
        name: String,
        registered: &'static str,
        requested: &'static str,
    },

    #[error("no reader consumed the delivery to webhook {0} in time")]
    DeliveryTimeout(String),

    #[error("webhook {0} was removed while the delivery was pending")]
    Removed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_mode_as_snake_case() {
        let json = serde_json::to_string(&WebhookMode::AppletTrigger).unwrap();
        assert_eq!(json, "\"applet_trigger\"");
    }

    #[test]
    fn should_render_mode_mismatch_with_both_modes() {
        let err = WebhookError::ModeMismatch {
            name: "hook".to_string(),
            registered: WebhookMode::ServiceInteraction.as_str(),
            requested: WebhookMode::AppletTrigger.as_str(),
        };
        assert_eq!(
            err.to_string(),
            "webhook hook is registered as service_interaction, not applet_trigger"
        );
    }
}
