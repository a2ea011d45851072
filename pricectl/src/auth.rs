//! Session credentials for the remote spreadsheet export.
//!
//! Issuing and refreshing tokens happens elsewhere. The pipeline only needs to know whether a
//! non-expired bearer token is available, and to persist the session between runs.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::storage::StorageSlot;

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// OAuth tokens; `expires_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTokens {
    pub access_token: String,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl OAuthTokens {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated,
}

/// Current authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub status: AuthStatus,
    pub user: Option<AuthUser>,
    pub tokens: Option<OAuthTokens>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

impl AuthSession {
    pub fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: None,
            tokens: None,
        }
    }

    pub fn authenticated(user: AuthUser, tokens: OAuthTokens) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            user: Some(user),
            tokens: Some(tokens),
        }
    }

    /// The access token, only when the session is authenticated, the token is non-empty and
    /// it has not expired.
    pub fn bearer_token(&self) -> Option<&str> {
        if self.status != AuthStatus::Authenticated {
            return None;
        }
        self.tokens
            .as_ref()
            .filter(|t| !t.access_token.is_empty() && !t.is_expired())
            .map(|t| t.access_token.as_str())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    user: AuthUser,
    tokens: OAuthTokens,
}

/// Persists the session as base64-encoded JSON in a [`StorageSlot`].
#[derive(Clone)]
pub struct CredentialStore {
    slot: Arc<dyn StorageSlot>,
}

impl CredentialStore {
    pub fn new(slot: Arc<dyn StorageSlot>) -> Self {
        Self { slot }
    }

    /// Load the stored session.
    ///
    /// Missing or malformed content yields an unauthenticated session. Expired content is
    /// also removed from storage.
    pub fn load(&self) -> AuthSession {
        let raw = match self.slot.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return AuthSession::unauthenticated(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credentials");
                return AuthSession::unauthenticated();
            }
        };

        let Some(persisted) = decode(&raw) else {
            tracing::warn!("Stored credentials are malformed, ignoring them");
            return AuthSession::unauthenticated();
        };

        if persisted.tokens.is_expired() {
            tracing::info!("Stored credentials have expired, clearing them");
            if let Err(e) = self.slot.remove() {
                tracing::warn!(error = %e, "Failed to clear expired credentials");
            }
            return AuthSession::unauthenticated();
        }

        AuthSession::authenticated(persisted.user, persisted.tokens)
    }

    pub fn save(&self, user: &AuthUser, tokens: &OAuthTokens) -> Result<()> {
        let payload = serde_json::to_vec(&PersistedSession {
            user: user.clone(),
            tokens: tokens.clone(),
        })?;
        self.slot.write(&general_purpose::STANDARD.encode(payload))
    }

    pub fn clear(&self) -> Result<()> {
        self.slot.remove()
    }
}

fn decode(raw: &str) -> Option<PersistedSession> {
    let bytes = general_purpose::STANDARD.decode(raw.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySlot;

    fn user() -> AuthUser {
        AuthUser {
            id: "1".to_string(),
            email: "ops@example.com".to_string(),
            display_name: Some("Ops".to_string()),
            photo_url: None,
            domain: None,
        }
    }

    fn tokens(expires_in_ms: i64) -> OAuthTokens {
        OAuthTokens {
            access_token: "ya29.token".to_string(),
            expires_at: Utc::now().timestamp_millis() + expires_in_ms,
            refresh_token: None,
            scope: Some(vec!["https://www.googleapis.com/auth/spreadsheets".to_string()]),
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_bearer_token_requires_valid_session() {
        assert_eq!(AuthSession::unauthenticated().bearer_token(), None);

        let valid = AuthSession::authenticated(user(), tokens(60_000));
        assert_eq!(valid.bearer_token(), Some("ya29.token"));

        let expired = AuthSession::authenticated(user(), tokens(-1));
        assert_eq!(expired.bearer_token(), None);

        let mut empty = tokens(60_000);
        empty.access_token.clear();
        assert_eq!(AuthSession::authenticated(user(), empty).bearer_token(), None);
    }

    #[test]
    fn test_save_then_load_round_trips_through_base64() {
        let slot = MemorySlot::new();
        let store = CredentialStore::new(Arc::new(slot.clone()));
        store.save(&user(), &tokens(60_000)).unwrap();

        let raw = slot.peek().unwrap();
        assert!(!raw.contains("ya29.token"));
        let json: serde_json::Value = serde_json::from_slice(&general_purpose::STANDARD.decode(&raw).unwrap()).unwrap();
        assert_eq!(json["tokens"]["accessToken"], "ya29.token");
        assert_eq!(json["user"]["displayName"], "Ops");

        let session = store.load();
        assert_eq!(session.status, AuthStatus::Authenticated);
        assert_eq!(session.user, Some(user()));
    }

    #[test]
    fn test_expired_credentials_are_cleared() {
        let slot = MemorySlot::new();
        let store = CredentialStore::new(Arc::new(slot.clone()));
        store.save(&user(), &tokens(-1_000)).unwrap();

        assert_eq!(store.load(), AuthSession::unauthenticated());
        assert_eq!(slot.peek(), None);
    }

    #[test]
    fn test_malformed_credentials_are_ignored() {
        let store = CredentialStore::new(Arc::new(MemorySlot::with_value("%%% not base64")));
        assert_eq!(store.load().status, AuthStatus::Unauthenticated);

        let not_json = general_purpose::STANDARD.encode("hello");
        let store = CredentialStore::new(Arc::new(MemorySlot::with_value(not_json)));
        assert_eq!(store.load().status, AuthStatus::Unauthenticated);
    }
}
