//! Store — the per-worker key/value execution context of one capability.
//!
//! Keys are namespaced by convention:
//!
//! | Prefix | Owner | Lifetime |
//! |--------|-------|----------|
//! | `req:` | user settings from the [`AreaBinding`](crate::applet::AreaBinding) | replaced on reconfigure |
//! | `ctx:` | values memoised by the capability across poll cycles | cleared on reconfigure |
//!
//! A store lives exactly as long as its worker. Pausing keeps it intact.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::applet::Settings;
use crate::execution::CapabilityError;

/// Key namespace inside a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// User-supplied settings.
    Request,
    /// Values derived and memoised by the capability.
    Context,
}

impl Namespace {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Request => "req:",
            Self::Context => "ctx:",
        }
    }

    /// Qualify a bare key with this namespace, leaving qualified keys alone.
    #[must_use]
    pub fn qualify(self, key: &str) -> String {
        if key.starts_with(self.prefix()) {
            key.to_string()
        } else {
            format!("{}{key}", self.prefix())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Store {
    entries: BTreeMap<String, Value>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from binding settings; bare keys land under `req:`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let mut store = Self::new();
        store.replace_settings(settings);
        store
    }

    /// Drop every `req:` key and insert the given settings instead.
    pub fn replace_settings(&mut self, settings: &Settings) {
        self.clear_namespace(Namespace::Request);
        for (key, value) in settings {
            self.entries
                .insert(Namespace::Request.qualify(key), value.clone());
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Read an integer, accepting numeric strings as user settings often are.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a float, accepting numeric strings.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a required string setting.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::MissingSetting`] when the key is absent or
    /// not a string.
    pub fn require_str(&self, key: &str) -> Result<&str, CapabilityError> {
        self.get_str(key)
            .ok_or_else(|| CapabilityError::MissingSetting(key.to_string()))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Remove every key starting with `prefix`, returning how many were dropped.
    pub fn clear_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear_namespace(&mut self, namespace: Namespace) -> usize {
        self.clear_prefix(namespace.prefix())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Settings {
        match value {
            Value::Object(map) => map,
            _ => Settings::new(),
        }
    }

    #[test]
    fn should_qualify_bare_setting_keys_under_request_namespace() {
        let store = Store::from_settings(&settings(json!({
            "webhook:url": "http://a",
            "req:webhook:method": "GET",
        })));
        assert_eq!(store.get_str("req:webhook:url"), Some("http://a"));
        assert_eq!(store.get_str("req:webhook:method"), Some("GET"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn should_clear_only_context_keys_when_clearing_context_namespace() {
        let mut store = Store::from_settings(&settings(json!({"req:a": 1})));
        store.set("ctx:last", 3);
        store.set("ctx:total", 9);

        let removed = store.clear_namespace(Namespace::Context);

        assert_eq!(removed, 2);
        assert!(store.contains("req:a"));
        assert!(!store.contains("ctx:last"));
    }

    #[test]
    fn should_keep_context_when_settings_are_replaced() {
        let mut store = Store::from_settings(&settings(json!({"req:old": "x"})));
        store.set("ctx:seen", true);

        store.replace_settings(&settings(json!({"req:new": "y"})));

        assert!(!store.contains("req:old"));
        assert_eq!(store.get_str("req:new"), Some("y"));
        assert_eq!(store.get("ctx:seen"), Some(&json!(true)));
    }

    #[test]
    fn should_parse_numeric_strings_when_reading_numbers() {
        let mut store = Store::new();
        store.set("req:time:duration", "15");
        store.set("req:ratio", "0.5");
        assert_eq!(store.get_i64("req:time:duration"), Some(15));
        assert_eq!(store.get_f64("req:ratio"), Some(0.5));
        assert_eq!(store.get_i64("req:missing"), None);
    }

    #[test]
    fn should_report_missing_setting_when_required_key_absent() {
        let store = Store::new();
        let err = store.require_str("req:webhook:url").unwrap_err();
        assert!(matches!(err, CapabilityError::MissingSetting(key) if key == "req:webhook:url"));
    }
}
