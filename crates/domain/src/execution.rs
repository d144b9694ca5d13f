//! Execution result — the uniform envelope returned by every capability call.

use serde_json::Value;

use crate::applet::Settings;

/// Fields emitted by an action, consumed by the paired reaction.
pub type EventData = Settings;

/// Failure of a single capability call. Never fatal to the worker.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("missing required setting {0:?}")]
    MissingSetting(String),

    #[error("invalid setting {key:?}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("the capability requires an authorization")]
    MissingAuthorization,

    #[error("unexpected response status {actual}, expected {expected}")]
    UnexpectedStatus { expected: u16, actual: u16 },

    /// An inbound payload could not be read as text.
    #[error("payload is not valid UTF-8")]
    InvalidPayload(#[from] std::string::FromUtf8Error),

    /// The outbound call to the external service failed.
    #[error("external call failed")]
    External(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CapabilityError {
    pub fn external(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::External(Box::new(err))
    }
}

/// Outcome of evaluating an action or reaction.
///
/// - `error` set: the call could not be completed.
/// - `success == false` without error: polled, nothing new (actions only).
/// - `success == true`: an event was detected; `data` carries its fields.
///
/// Reactions only report `error`; their `success` flag is ignored.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub error: Option<CapabilityError>,
    pub success: bool,
    pub data: EventData,
}

impl ExecutionResult {
    /// A new event was detected.
    #[must_use]
    pub fn triggered(data: EventData) -> Self {
        Self {
            error: None,
            success: true,
            data,
        }
    }

    /// Nothing new since the last call.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// A reaction completed its effect.
    #[must_use]
    pub fn done() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failed(error: CapabilityError) -> Self {
        Self {
            error: Some(error),
            success: false,
            data: EventData::new(),
        }
    }

    /// Attach one emitted field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

impl From<Result<Self, CapabilityError>> for ExecutionResult {
    fn from(result: Result<Self, CapabilityError>) -> Self {
        result.unwrap_or_else(Self::failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_no_event_without_error_when_idle() {
        let result = ExecutionResult::idle();
        assert!(!result.success);
        assert!(!result.is_failure());
    }

    #[test]
    fn should_carry_emitted_fields_when_triggered() {
        let result = ExecutionResult::triggered(EventData::new()).with("x", 1);
        assert!(result.success);
        assert_eq!(result.data.get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn should_flatten_error_results_into_failed_envelope() {
        let result: ExecutionResult =
            Err(CapabilityError::MissingSetting("req:url".to_string())).into();
        assert!(result.is_failure());
        assert!(!result.success);
    }
}
