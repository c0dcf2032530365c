//! Credentials presented by a caller

use keyward_authentication::SessionPair;
use serde::{Deserialize, Serialize};

/// Whatever the transport layer extracted from a request.
///
/// An API key, when present, is used instead of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// API key sent by a service client
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Session key half
    #[serde(rename = "sessionKey", default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    /// Session token half
    #[serde(rename = "sessionToken", default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Credentials carrying only an API key
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Credentials carrying a session pair
    pub fn session(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session_key: Some(key.into()),
            session_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Both session halves, when both were presented and non-empty
    pub fn session_pair(&self) -> Option<(&str, &str)> {
        match (self.session_key.as_deref(), self.session_token.as_deref()) {
            (Some(key), Some(token)) if !key.is_empty() && !token.is_empty() => Some((key, token)),
            _ => None,
        }
    }

    /// Non-empty API key, if present
    pub fn api_key_value(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl From<SessionPair> for Credentials {
    fn from(pair: SessionPair) -> Self {
        Self::session(pair.key, pair.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_a_session_is_no_session() {
        let creds = Credentials {
            session_key: Some("k".into()),
            ..Default::default()
        };
        assert_eq!(creds.session_pair(), None);
        assert_eq!(Credentials::session("k", "t").session_pair(), Some(("k", "t")));
    }

    #[test]
    fn empty_api_key_is_ignored() {
        assert_eq!(Credentials::api_key("").api_key_value(), None);
        assert_eq!(Credentials::api_key("abc").api_key_value(), Some("abc"));
    }
}
