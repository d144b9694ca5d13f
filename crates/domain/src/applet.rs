//! Applet — one action bound to one reaction.
//!
//! An applet is owned by persistence. The scheduler only reads its identity
//! and bindings, and writes back the `active` flag and the run `status`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AreaFlowError, ValidationError};
use crate::id::{AppletId, AuthorizationId};

/// Free-form settings attached to a binding, keyed by setting name.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Which half of an applet a binding, store or capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Action,
    Reaction,
}

impl Side {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Reaction => "reaction",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "action" => Ok(Self::Action),
            "reaction" => Ok(Self::Reaction),
            other => Err(ValidationError::InvalidSide(other.to_string())),
        }
    }
}

/// Reference to a capability in the catalog, written `service:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AreaRef {
    pub service: String,
    pub name: String,
}

impl AreaRef {
    #[must_use]
    pub fn new(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AreaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.name)
    }
}

impl FromStr for AreaRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((service, name)) if !service.is_empty() && !name.is_empty() => {
                Ok(Self::new(service, name))
            }
            _ => Err(ValidationError::InvalidAreaRef(s.to_string())),
        }
    }
}

impl Serialize for AreaRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AreaRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One side of an applet: which capability to run and with which settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaBinding {
    pub area: AreaRef,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationId>,
}

impl AreaBinding {
    #[must_use]
    pub fn new(area: AreaRef) -> Self {
        Self {
            area,
            settings: Settings::new(),
            authorization: None,
        }
    }

    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn authorization(mut self, id: AuthorizationId) -> Self {
        self.authorization = Some(id);
        self
    }
}

/// Whether the applet's worker was last known to be running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppletStatus {
    #[default]
    Stopped,
    Running,
}

impl AppletStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl FromStr for AppletStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

/// A user-defined wiring of one action to one reaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Applet {
    pub id: AppletId,
    pub name: String,
    pub description: String,
    pub action: AreaBinding,
    pub reaction: AreaBinding,
    /// Pause flag. An inactive applet keeps its worker but skips cycles.
    pub active: bool,
    pub status: AppletStatus,
}

impl Applet {
    /// Create a builder for constructing an [`Applet`].
    #[must_use]
    pub fn builder() -> AppletBuilder {
        AppletBuilder::default()
    }

    /// Borrow the binding for one side.
    #[must_use]
    pub fn binding(&self, side: Side) -> &AreaBinding {
        match side {
            Side::Action => &self.action,
            Side::Reaction => &self.reaction,
        }
    }

    /// Replace the binding for one side.
    pub fn set_binding(&mut self, side: Side, binding: AreaBinding) {
        match side {
            Side::Action => self.action = binding,
            Side::Reaction => self.reaction = binding,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is empty.
    pub fn validate(&self) -> Result<(), AreaFlowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Applet`].
#[derive(Debug, Default)]
pub struct AppletBuilder {
    id: Option<AppletId>,
    name: Option<String>,
    description: Option<String>,
    action: Option<AreaBinding>,
    reaction: Option<AreaBinding>,
    active: Option<bool>,
    status: Option<AppletStatus>,
}

impl AppletBuilder {
    #[must_use]
    pub fn id(mut self, id: AppletId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn action(mut self, binding: AreaBinding) -> Self {
        self.action = Some(binding);
        self
    }

    #[must_use]
    pub fn reaction(mut self, binding: AreaBinding) -> Self {
        self.reaction = Some(binding);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn status(mut self, status: AppletStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Consume the builder, validate, and return an [`Applet`].
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Validation`] if the name is empty or a
    /// binding is missing.
    pub fn build(self) -> Result<Applet, AreaFlowError> {
        let action = self
            .action
            .ok_or_else(|| ValidationError::InvalidAreaRef("<missing action>".to_string()))?;
        let reaction = self
            .reaction
            .ok_or_else(|| ValidationError::InvalidAreaRef("<missing reaction>".to_string()))?;
        let applet = Applet {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            action,
            reaction,
            active: self.active.unwrap_or(true),
            status: self.status.unwrap_or_default(),
        };
        applet.validate()?;
        Ok(applet)
    }
}
