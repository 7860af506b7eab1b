//! Identity of the signed-in user, as returned by credential verification.

use serde::{Deserialize, Serialize};

use super::Email;

/// The verified user behind the current credential.
///
/// Identity is never persisted; it is re-derived from the credential on every
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account email.
    pub email: Email,
    /// Display name from the identity provider.
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
    /// Avatar URL from the identity provider.
    #[serde(rename = "picture", default)]
    pub picture_url: Option<String>,
}

impl Identity {
    /// Name to show in the UI, falling back to the email address.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.email.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_login_response() {
        let json = r#"{
            "_id": "665f",
            "email": "ana@example.com",
            "name": "Ana",
            "picture": "https://img.example.com/ana.png",
            "created_at": "2024-03-20T10:00:00",
            "last_login": "2024-03-21T10:00:00"
        }"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.email.as_str(), "ana@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ana"));
        assert_eq!(identity.label(), "Ana");
    }

    #[test]
    fn test_label_falls_back_to_email() {
        let identity: Identity =
            serde_json::from_str(r#"{"email": "ana@example.com", "name": null}"#).unwrap();
        assert_eq!(identity.label(), "ana@example.com");
        assert!(identity.picture_url.is_none());
    }
}
