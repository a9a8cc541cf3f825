//! Wire types for the GoTrue REST API and the admin allow-list table.

use crate::portal::store::Session;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct PkceGrant<'a> {
    pub auth_code: &'a str,
    pub code_verifier: &'a str,
}

#[derive(Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub struct RecoverRequest<'a> {
    pub email: &'a str,
    pub code_challenge: &'a str,
    pub code_challenge_method: &'a str,
}

#[derive(Serialize)]
pub struct UpdateUserRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub user: Option<UserResponse>,
}

impl TokenResponse {
    /// `now` is unix seconds; used when the backend only sent `expires_in`.
    #[must_use]
    pub fn into_session(self, now: u64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|ttl| now.saturating_add(ttl)));
        let (user_id, email) = self
            .user
            .map_or((None, None), |user| (Some(user.id), user.email));
        Session {
            user_id,
            email,
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminRow {
    pub user_id: String,
}

/// Persisted form of a [`Session`].
#[derive(Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
            expires_at: session.expires_at,
            user_id: session.user_id.clone(),
            email: session.email.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            user_id: stored.user_id,
            email: stored.email,
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
        }
    }
}
