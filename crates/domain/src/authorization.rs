//! Authorization — an already-resolved credential for a third-party service.
//!
//! The scheduler never acquires or refreshes credentials; it hands the stored
//! value to the capability that needs it.

use serde::{Deserialize, Serialize};

use crate::applet::Settings;
use crate::id::AuthorizationId;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    /// Name of the service the credential was issued for.
    pub service: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(default, skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    /// Provider-specific values returned with the token.
    #[serde(default)]
    pub extra: Settings,
}

impl Authorization {
    #[must_use]
    pub fn new(service: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: AuthorizationId::new(),
            service: service.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            extra: Settings::new(),
        }
    }

    /// Whether the access token is past its expiry at `at`.
    #[must_use]
    pub fn is_expired(&self, at: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp <= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn should_not_expire_when_no_expiry_is_known() {
        let auth = Authorization::new("github", "token");
        assert!(!auth.is_expired(crate::time::now()));
    }

    #[test]
    fn should_expire_once_deadline_has_passed() {
        let now = crate::time::now();
        let mut auth = Authorization::new("github", "token");
        auth.expires_at = Some(now - Duration::seconds(1));
        assert!(auth.is_expired(now));
    }

    #[test]
    fn should_not_leak_tokens_when_serialized() {
        let mut auth = Authorization::new("spotify", "secret-access");
        auth.refresh_token = Some("secret-refresh".to_string());
        let json = serde_json::to_string(&auth).unwrap();
        assert!(!json.contains("secret"));
    }
}
