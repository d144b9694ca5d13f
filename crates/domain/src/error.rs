//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AreaFlowError`] via `#[from]`. Adapters box their own error types into
//! the [`Storage`](AreaFlowError::Storage) or [`Log`](AreaFlowError::Log)
//! variants so the domain never depends on an IO crate.

use crate::execution::CapabilityError;
use crate::webhook::WebhookError;

/// Top-level error returned by application services and ports.
#[derive(Debug, thiserror::Error)]
pub enum AreaFlowError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("conflict")]
    Conflict(#[from] ConflictError),

    #[error("webhook error")]
    Webhook(#[from] WebhookError),

    #[error("capability error")]
    Capability(#[from] CapabilityError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The per-applet log could not be opened or written.
    #[error("applet log error")]
    Log(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated by caller-supplied data.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("invalid area reference {0:?}, expected `service:name`")]
    InvalidAreaRef(String),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("unknown area side {0:?}, expected `action` or `reaction`")]
    InvalidSide(String),

    #[error("unknown applet status {0:?}")]
    InvalidStatus(String),

    #[error("missing required setting {0:?}")]
    MissingSetting(String),

    #[error("{capability} cannot be used as an {side}")]
    WrongSide {
        capability: String,
        side: &'static str,
    },
}

/// A looked-up resource does not exist.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The operation conflicts with the current state of a resource.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("trigger {0} is still running, stop it first")]
    StillRunning(String),

    #[error("trigger {0} is not running")]
    NotRunning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_not_found_error_via_from() {
        let err: AreaFlowError = NotFoundError {
            entity: "Trigger",
            id: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, AreaFlowError::NotFound(_)));
    }

    #[test]
    fn should_render_not_found_message_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Webhook",
            id: "hook".to_string(),
        };
        assert_eq!(err.to_string(), "Webhook hook not found");
    }

    #[test]
    fn should_render_still_running_conflict() {
        let err = ConflictError::StillRunning("42".to_string());
        assert_eq!(err.to_string(), "trigger 42 is still running, stop it first");
    }
}
