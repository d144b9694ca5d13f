//! Capability contract — the fixed surface through which the scheduler
//! invokes actions and reactions.
//!
//! A worker never knows which concrete service it drives. It holds a
//! [`BoundCapability`] per side and calls [`Capability::evaluate`] with a
//! [`CapabilityContext`] built from its own state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use areaflow_domain::applet::{AreaBinding, AreaRef, Settings, Side};
use areaflow_domain::authorization::Authorization;
use areaflow_domain::error::{AreaFlowError, NotFoundError, ValidationError};
use areaflow_domain::execution::{EventData, ExecutionResult};
use areaflow_domain::id::AppletId;
use areaflow_domain::store::{Namespace, Store};
use areaflow_domain::webhook::WebhookMode;

use crate::ports::AppletLog;

/// Everything a capability may see or touch during one call.
pub struct CapabilityContext<'a> {
    pub applet_id: AppletId,
    /// Credential attached to this side's binding, if any.
    pub authorization: Option<&'a Authorization>,
    /// The side's store. Mutations persist across calls for the lifetime of
    /// the worker.
    pub store: &'a mut Store,
    /// Data emitted by the action in this cycle. Empty for actions.
    pub data: &'a EventData,
    pub log: &'a dyn AppletLog,
}

/// A pluggable action or reaction.
///
/// Implementations must bound their own external calls: a worker cannot
/// observe a stop request while blocked inside `evaluate`.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult;
}

/// Static description of a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitySpec {
    pub area: AreaRef,
    pub side: Side,
    /// Calls allowed per poll window. Zero means poll continuously, used by
    /// actions that block on their own bounded wait.
    pub rate_limit: u32,
    /// Set when the action is fed by the webhook broker.
    pub webhook: Option<WebhookMode>,
    /// Settings keys that must be present on the binding.
    pub required: &'static [&'static str],
}

impl CapabilitySpec {
    #[must_use]
    pub fn action(area: AreaRef) -> Self {
        Self {
            area,
            side: Side::Action,
            rate_limit: 1,
            webhook: None,
            required: &[],
        }
    }

    #[must_use]
    pub fn reaction(area: AreaRef) -> Self {
        Self {
            side: Side::Reaction,
            ..Self::action(area)
        }
    }

    #[must_use]
    pub fn rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    #[must_use]
    pub fn webhook(mut self, mode: WebhookMode) -> Self {
        self.webhook = Some(mode);
        self
    }

    #[must_use]
    pub fn required(mut self, keys: &'static [&'static str]) -> Self {
        self.required = keys;
        self
    }

    /// Delay between two polls given a poll window.
    #[must_use]
    pub fn poll_interval(&self, window: Duration) -> Duration {
        if self.rate_limit == 0 {
            Duration::ZERO
        } else {
            window / self.rate_limit
        }
    }

    /// Check that every required key is present, bare or `req:`-qualified.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingSetting`] naming the first absent key.
    pub fn check_settings(&self, settings: &Settings) -> Result<(), ValidationError> {
        let present: Vec<String> = settings
            .keys()
            .map(|key| Namespace::Request.qualify(key))
            .collect();
        match self
            .required
            .iter()
            .find(|key| !present.iter().any(|p| p == *key))
        {
            Some(missing) => Err(ValidationError::MissingSetting((*missing).to_string())),
            None => Ok(()),
        }
    }
}

/// A catalog entry: description plus a shareable handle.
#[derive(Clone)]
pub struct ResolvedCapability {
    pub spec: CapabilitySpec,
    pub handle: Arc<dyn Capability>,
}

/// A capability resolved for one applet side, with its settings and credential.
#[derive(Clone)]
pub struct BoundCapability {
    pub spec: CapabilitySpec,
    pub handle: Arc<dyn Capability>,
    pub settings: Settings,
    pub authorization: Option<Authorization>,
}

impl std::fmt::Debug for BoundCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCapability")
            .field("area", &self.spec.area)
            .field("side", &self.spec.side)
            .finish_non_exhaustive()
    }
}

/// Lookup of capabilities by `service:name` and side.
pub trait CapabilityCatalog: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] for an unknown area, or
    /// [`ValidationError::WrongSide`] when it exists only for the other side.
    fn resolve(&self, area: &AreaRef, side: Side) -> Result<ResolvedCapability, AreaFlowError>;

    /// Resolve a binding and check its settings against the capability.
    ///
    /// # Errors
    ///
    /// Propagates [`resolve`](Self::resolve) errors, or returns
    /// [`ValidationError::MissingSetting`].
    fn check_binding(
        &self,
        binding: &AreaBinding,
        side: Side,
    ) -> Result<ResolvedCapability, AreaFlowError> {
        let resolved = self.resolve(&binding.area, side)?;
        resolved.spec.check_settings(&binding.settings)?;
        Ok(resolved)
    }
}

impl<T: CapabilityCatalog + ?Sized> CapabilityCatalog for Arc<T> {
    fn resolve(&self, area: &AreaRef, side: Side) -> Result<ResolvedCapability, AreaFlowError> {
        (**self).resolve(area, side)
    }
}

/// In-memory catalog keyed by [`AreaRef`].
#[derive(Clone, Default)]
pub struct CapabilitySet {
    entries: HashMap<AreaRef, ResolvedCapability>,
}

impl CapabilitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any previous one for the same area.
    #[must_use]
    pub fn with(mut self, spec: CapabilitySpec, handle: impl Capability + 'static) -> Self {
        self.insert(spec, Arc::new(handle));
        self
    }

    pub fn insert(&mut self, spec: CapabilitySpec, handle: Arc<dyn Capability>) {
        self.entries
            .insert(spec.area.clone(), ResolvedCapability { spec, handle });
    }

    pub fn specs(&self) -> impl Iterator<Item = &CapabilitySpec> {
        self.entries.values().map(|entry| &entry.spec)
    }
}

impl CapabilityCatalog for CapabilitySet {
    fn resolve(&self, area: &AreaRef, side: Side) -> Result<ResolvedCapability, AreaFlowError> {
        let entry = self.entries.get(area).ok_or_else(|| NotFoundError {
            entity: "Capability",
            id: area.to_string(),
        })?;
        if entry.spec.side != side {
            return Err(ValidationError::WrongSide {
                capability: area.to_string(),
                side: side.as_str(),
            }
            .into());
        }
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait::async_trait]
    impl Capability for Noop {
        async fn evaluate(&self, _ctx: CapabilityContext<'_>) -> ExecutionResult {
            ExecutionResult::idle()
        }
    }

    fn catalog() -> CapabilitySet {
        CapabilitySet::new()
            .with(
                CapabilitySpec::action(AreaRef::new("time", "wait_time"))
                    .required(&["req:time:duration", "req:time:unit"]),
                Noop,
            )
            .with(
                CapabilitySpec::reaction(AreaRef::new("webhook", "trigger_webhook")),
                Noop,
            )
    }

    #[test]
    fn should_derive_poll_interval_from_rate_limit() {
        let spec = CapabilitySpec::action(AreaRef::new("a", "b")).rate_limit(3);
        assert_eq!(
            spec.poll_interval(Duration::from_secs(30)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn should_poll_continuously_when_rate_limit_is_zero() {
        let spec = CapabilitySpec::action(AreaRef::new("a", "b")).rate_limit(0);
        assert_eq!(spec.poll_interval(Duration::from_secs(30)), Duration::ZERO);
    }

    #[test]
    fn should_return_not_found_when_area_is_unknown() {
        let result = catalog().resolve(&AreaRef::new("spotify", "play"), Side::Reaction);
        assert!(matches!(result, Err(AreaFlowError::NotFound(_))));
    }

    #[test]
    fn should_reject_capability_used_on_wrong_side() {
        let result = catalog().resolve(&AreaRef::new("webhook", "trigger_webhook"), Side::Action);
        assert!(matches!(
            result,
            Err(AreaFlowError::Validation(ValidationError::WrongSide { .. }))
        ));
    }

    #[test]
    fn should_reject_binding_when_required_setting_is_missing() {
        let binding = AreaBinding::new(AreaRef::new("time", "wait_time"))
            .setting("time:duration", "5");
        let result = catalog().check_binding(&binding, Side::Action);
        assert!(matches!(
            result,
            Err(AreaFlowError::Validation(ValidationError::MissingSetting(key))) if key == "req:time:unit"
        ));
    }

    #[test]
    fn should_accept_binding_with_bare_or_qualified_keys() {
        let binding = AreaBinding::new(AreaRef::new("time", "wait_time"))
            .setting("time:duration", "5")
            .setting("req:time:unit", "seconds");
        assert!(catalog().check_binding(&binding, Side::Action).is_ok());
    }
}
