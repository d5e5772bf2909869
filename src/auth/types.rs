//! Auth data types
//!
//! Credentials are supplied once at startup. Tokens are minted by the token
//! endpoint and replaced wholesale on refresh, never patched in place.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Grant type sent to the token endpoint
pub const PASSWORD_GRANT: &str = "password";

/// Long-lived credentials used to mint access tokens
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Resource owner username
    pub username: String,
    /// Resource owner password
    pub password: String,
}

impl Credentials {
    /// Create a credential set
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A bearer token and the instant it stops being accepted
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// The access token
    pub access_token: String,
    /// Absolute expiry, as reported by the token endpoint
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Create a token that expires N seconds from now
    pub fn expires_in(access_token: impl Into<String>, seconds: i64) -> Self {
        Self::new(access_token, Utc::now() + Duration::seconds(seconds))
    }

    /// Whether the token may still be used at `now`, keeping `margin` in reserve
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        !self.access_token.is_empty() && now < self.expires_at - margin
    }

    /// Whether the token may be used right now
    pub fn is_valid(&self, margin: Duration) -> bool {
        self.is_valid_at(Utc::now(), margin)
    }

    /// Short, log-safe prefix of the token
    pub fn redacted(&self) -> String {
        let prefix: String = self.access_token.chars().take(6).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &self.redacted())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token shape stored in config and state files between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    /// The access token
    pub access_token: String,
    /// Absolute expiry as unix seconds
    pub token_expires_at: i64,
}

impl From<&Token> for PersistedToken {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_expires_at: token.expires_at.timestamp(),
        }
    }
}

impl PersistedToken {
    /// Convert back into a live token; `None` if the timestamp is out of range
    pub fn to_token(&self) -> Option<Token> {
        let expires_at = Utc.timestamp_opt(self.token_expires_at, 0).single()?;
        Some(Token::new(self.access_token.clone(), expires_at))
    }
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    /// Validate the response and anchor its relative expiry at `now`
    pub(crate) fn into_token(self, now: DateTime<Utc>) -> Result<Token> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth("token response is missing 'access_token'"))?;

        let expires_in = match self.expires_in {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::auth("token response is missing a numeric 'expires_in'"))?;

        if let Some(kind) = self.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                tracing::warn!(token_type = kind, "token endpoint returned a non-bearer token type");
            }
        }

        Ok(Token::new(access_token, now + Duration::seconds(expires_in)))
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_valid_outside_margin() {
        let token = Token::expires_in("test", 3600);
        assert!(token.is_valid(Duration::seconds(120)));
    }

    #[test]
    fn test_token_invalid_inside_margin() {
        let token = Token::expires_in("test", 60);
        assert!(!token.is_valid(Duration::seconds(120)));
    }

    #[test]
    fn test_token_expired() {
        let token = Token::expires_in("test", -100);
        assert!(!token.is_valid(Duration::zero()));
    }

    #[test]
    fn test_empty_token_is_never_valid() {
        let token = Token::expires_in("", 3600);
        assert!(!token.is_valid(Duration::zero()));
    }

    #[test]
    fn test_validity_boundary_is_exclusive() {
        let now = Utc::now();
        let token = Token::new("t", now + Duration::seconds(120));
        assert!(!token.is_valid_at(now, Duration::seconds(120)));
        assert!(token.is_valid_at(now - Duration::seconds(1), Duration::seconds(120)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("id", "very-secret", "user", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("hunter2"));

        let token = Token::expires_in("abcdefghijklmnop", 10);
        assert!(!format!("{token:?}").contains("ghijklmnop"));
    }

    #[test]
    fn test_persisted_token_roundtrip_keeps_second_precision() {
        let token = Token::new("abc", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let persisted = PersistedToken::from(&token);
        assert_eq!(persisted.token_expires_at, 1_700_000_000);
        assert_eq!(persisted.to_token(), Some(token));
    }

    #[test]
    fn test_token_response_parses_numeric_and_string_expiry() {
        let now = Utc::now();
        let numeric: TokenResponse =
            serde_json::from_value(json!({"access_token": "a", "expires_in": 3600})).unwrap();
        assert_eq!(
            numeric.into_token(now).unwrap().expires_at,
            now + Duration::seconds(3600)
        );

        let text: TokenResponse =
            serde_json::from_value(json!({"access_token": "a", "expires_in": "60"})).unwrap();
        assert_eq!(
            text.into_token(now).unwrap().expires_at,
            now + Duration::seconds(60)
        );
    }

    #[test]
    fn test_token_response_missing_fields_is_auth_error() {
        let now = Utc::now();
        let no_token: TokenResponse =
            serde_json::from_value(json!({"expires_in": 3600})).unwrap();
        assert!(matches!(
            no_token.into_token(now),
            Err(Error::Authentication { .. })
        ));

        let no_expiry: TokenResponse =
            serde_json::from_value(json!({"access_token": "a"})).unwrap();
        assert!(matches!(
            no_expiry.into_token(now),
            Err(Error::Authentication { .. })
        ));
    }
}
