//! [`SessionStore`] backed by a GoTrue (Supabase Auth) server.
//!
//! Flow Overview:
//! - Sign-in, PKCE exchange and refresh all go through `/auth/v1/token` and
//!   persist the resulting session under the project's storage key.
//! - `current_session` refreshes a session that is about to expire; a
//!   rejected refresh clears it and announces `SIGNED_OUT`.
//! - Reset e-mails carry an S256 challenge; the verifier stays in storage
//!   until the code from the link is exchanged.
//! - Admin status is a row lookup in a PostgREST table, made with the user's
//!   own token so row-level security applies.

use super::{
    api::Transport,
    error::GoTrueError,
    pkce,
    storage::{SessionStorage, StorageKeys},
    types::{
        AdminRow, PasswordGrant, PkceGrant, RecoverRequest, RefreshGrant, StoredSession,
        TokenResponse, UpdateUserRequest, UserResponse,
    },
};
use crate::portal::store::{
    AuthEvent, Session, SessionNotifier, SessionStore, StoreError, Subscription,
};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, instrument, warn};
use url::Url;

/// Sessions expiring within this many seconds are refreshed before use.
const EXPIRY_MARGIN_SECS: u64 = 60;

pub struct GoTrueStore {
    transport: Transport,
    storage: Arc<dyn SessionStorage>,
    keys: StorageKeys,
    admin_table: String,
    notifier: SessionNotifier,
    /// Bumped by every committed session write; guards refreshes that were
    /// started against an older session.
    generation: Mutex<u64>,
}

impl GoTrueStore {
    #[must_use]
    pub fn new(
        transport: Transport,
        storage: Arc<dyn SessionStorage>,
        admin_table: impl Into<String>,
    ) -> Self {
        let keys = StorageKeys::for_project(transport.base_url());
        Self {
            transport,
            storage,
            keys,
            admin_table: admin_table.into(),
            notifier: SessionNotifier::new(),
            generation: Mutex::new(0),
        }
    }

    #[must_use]
    pub const fn storage_keys(&self) -> &StorageKeys {
        &self.keys
    }

    fn load_session(&self) -> Result<Option<Session>, GoTrueError> {
        let Some(raw) = self.storage.get(&self.keys.session)? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => Ok(Some(stored.into())),
            Err(err) => {
                warn!("Discarding unreadable stored session: {err}");
                self.storage.remove(&self.keys.session)?;
                Ok(None)
            }
        }
    }

    fn save_session(&self, session: &Session) -> Result<(), GoTrueError> {
        let raw = serde_json::to_string(&StoredSession::from(session))
            .map_err(|err| GoTrueError::Serialization(err.to_string()))?;
        self.storage.set(&self.keys.session, &raw)
    }

    fn clear_session(&self) -> Result<(), GoTrueError> {
        self.storage.remove(&self.keys.session)
    }

    fn generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `session` (clears it for `None`) and announces `event` in one
    /// step. With `expected`, nothing happens unless no other write was
    /// committed since that generation was read.
    fn commit(
        &self,
        session: Option<Session>,
        event: AuthEvent,
        expected: Option<u64>,
    ) -> Result<bool, GoTrueError> {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if expected.is_some_and(|expected| expected != *generation) {
            return Ok(false);
        }
        match &session {
            Some(session) => self.save_session(session)?,
            None => self.clear_session()?,
        }
        *generation += 1;
        self.notifier.notify(event, session);
        Ok(true)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: &impl Serialize,
    ) -> Result<Session, GoTrueError> {
        let body = to_json(body)?;
        let response = self
            .transport
            .send(
                Method::POST,
                "/auth/v1/token",
                &[("grant_type", grant_type)],
                None,
                Some(&body),
            )
            .await?;
        let token: TokenResponse = from_json(response)?;
        Ok(token.into_session(unix_now()))
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<Session, GoTrueError> {
        debug!("Refreshing session");
        self.token_grant(
            "refresh_token",
            &RefreshGrant {
                refresh_token: refresh_token.expose_secret(),
            },
        )
        .await
    }

    async fn fetch_user(&self, access_token: &SecretString) -> Result<UserResponse, GoTrueError> {
        let response = self
            .transport
            .send(Method::GET, "/auth/v1/user", &[], Some(access_token), None)
            .await?;
        from_json(response)
    }

    async fn current(&self) -> Result<Option<Session>, GoTrueError> {
        let generation = self.generation();
        let Some(session) = self.load_session()? else {
            return Ok(None);
        };
        if !expires_soon(session.expires_at, unix_now()) {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                if self.commit(
                    Some(refreshed.clone()),
                    AuthEvent::TokenRefreshed,
                    Some(generation),
                )? {
                    Ok(Some(refreshed))
                } else {
                    debug!("Discarding refresh for a session that was replaced meanwhile");
                    self.load_session()
                }
            }
            Err(err) if err.is_client_error() => {
                warn!("Stored session could not be refreshed: {err}");
                if self.commit(None, AuthEvent::SignedOut, Some(generation))? {
                    Ok(None)
                } else {
                    self.load_session()
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Session for a legacy token pair: validated against `/user` while the
    /// access token is live, otherwise rebuilt from the refresh token.
    async fn session_from_tokens(
        &self,
        access_token: &SecretString,
        refresh_token: &SecretString,
    ) -> Result<(Session, AuthEvent), GoTrueError> {
        let expires_at = jwt_expiry(access_token.expose_secret());
        let live = expires_at.is_some_and(|exp| !expires_soon(Some(exp), unix_now()));

        if live {
            match self.fetch_user(access_token).await {
                Ok(user) => {
                    let session = Session {
                        user_id: Some(user.id),
                        email: user.email,
                        access_token: access_token.clone(),
                        refresh_token: refresh_token.clone(),
                        expires_at,
                    };
                    return Ok((session, AuthEvent::SignedIn));
                }
                Err(err) if err.is_unauthorized() => {
                    debug!("Access token rejected, falling back to refresh: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        let refreshed = self.refresh(refresh_token).await?;
        Ok((refreshed, AuthEvent::TokenRefreshed))
    }
}

#[async_trait]
impl SessionStore for GoTrueStore {
    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.current().await?)
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    #[instrument(skip_all)]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, StoreError> {
        let session = self
            .token_grant(
                "password",
                &PasswordGrant {
                    email,
                    password: password.expose_secret(),
                },
            )
            .await?;
        self.commit(Some(session.clone()), AuthEvent::SignedIn, None)?;
        Ok(session)
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> Result<(), StoreError> {
        let session = self.load_session()?;
        if let Some(session) = &session
            && let Err(err) = self
                .transport
                .send(
                    Method::POST,
                    "/auth/v1/logout",
                    &[],
                    Some(&session.access_token),
                    None,
                )
                .await
        {
            warn!("Remote sign-out failed, clearing local session anyway: {err}");
        }

        self.storage.remove(&self.keys.code_verifier)?;
        self.commit(None, AuthEvent::SignedOut, None)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &Url,
    ) -> Result<(), StoreError> {
        let pair = pkce::generate()?;
        self.storage
            .set(&self.keys.code_verifier, &pkce::recovery_entry(&pair.verifier))?;

        let body = to_json(&RecoverRequest {
            email,
            code_challenge: &pair.challenge,
            code_challenge_method: pkce::CHALLENGE_METHOD,
        })?;
        self.transport
            .send(
                Method::POST,
                "/auth/v1/recover",
                &[("redirect_to", redirect_to.as_str())],
                None,
                Some(&body),
            )
            .await?;
        debug!("Recovery e-mail requested");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn exchange_recovery_code(&self, code: &SecretString) -> Result<(), StoreError> {
        let entry = self
            .storage
            .get(&self.keys.code_verifier)?
            .ok_or(GoTrueError::MissingCodeVerifier)?;
        let (verifier, is_recovery) = pkce::parse_entry(&entry);

        let session = self
            .token_grant(
                "pkce",
                &PkceGrant {
                    auth_code: code.expose_secret(),
                    code_verifier: verifier.expose_secret(),
                },
            )
            .await?;
        self.storage.remove(&self.keys.code_verifier)?;

        let event = if is_recovery {
            AuthEvent::PasswordRecovery
        } else {
            AuthEvent::SignedIn
        };
        self.commit(Some(session), event, None)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn set_session_from_tokens(
        &self,
        access_token: &SecretString,
        refresh_token: &SecretString,
    ) -> Result<(), StoreError> {
        let (session, event) = self
            .session_from_tokens(access_token, refresh_token)
            .await?;
        self.commit(Some(session), event, None)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn update_password(&self, new_password: &SecretString) -> Result<(), StoreError> {
        let session = self.current().await?.ok_or(GoTrueError::MissingSession)?;
        let body = to_json(&UpdateUserRequest {
            password: new_password.expose_secret(),
        })?;
        let response = self
            .transport
            .send(
                Method::PUT,
                "/auth/v1/user",
                &[],
                Some(&session.access_token),
                Some(&body),
            )
            .await?;
        let user: UserResponse = from_json(response)?;

        let updated = Session {
            user_id: Some(user.id),
            email: user.email.or(session.email),
            ..session
        };
        self.commit(Some(updated), AuthEvent::UserUpdated, None)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn is_user_authorized_admin(&self, user_id: &str) -> Result<bool, StoreError> {
        let session = match self.current().await {
            Ok(session) => session,
            Err(err) => {
                debug!("Admin lookup without a session token: {err}");
                None
            }
        };
        let path = format!("/rest/v1/{}", self.admin_table);
        let filter = format!("eq.{user_id}");
        let response = self
            .transport
            .send(
                Method::GET,
                &path,
                &[("select", "user_id"), ("user_id", filter.as_str()), ("limit", "1")],
                session.as_ref().map(|session| &session.access_token),
                None,
            )
            .await?;
        let rows: Vec<AdminRow> = from_json(response)?;
        Ok(rows.iter().any(|row| row.user_id == user_id))
    }
}

fn to_json(body: &impl Serialize) -> Result<Value, GoTrueError> {
    serde_json::to_value(body)
        .map_err(|err| GoTrueError::Serialization(format!("Failed to encode request: {err}")))
}

fn from_json<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, GoTrueError> {
    serde_json::from_value(body)
        .map_err(|err| GoTrueError::Parse(format!("Failed to decode response: {err}")))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

const fn expires_soon(expires_at: Option<u64>, now: u64) -> bool {
    match expires_at {
        Some(expires_at) => expires_at <= now + EXPIRY_MARGIN_SECS,
        None => false,
    }
}

/// `exp` claim of a JWT, without verifying it. The server verifies.
fn jwt_expiry(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp").and_then(Value::as_u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gotrue::storage::MemoryStorage;
    use anyhow::Result;
    use serde_json::json;
    use std::{net::TcpListener, time::Duration};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn store(server: &MockServer) -> (GoTrueStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Transport::new(
            "meiportal-test",
            Url::parse(&server.uri()).unwrap(),
            secret("anon"),
        )
        .unwrap();
        let store = GoTrueStore::new(
            transport,
            Arc::clone(&storage) as Arc<dyn SessionStorage>,
            "portal_admins",
        );
        (store, storage)
    }

    fn token_body(access: &str, user_id: &str) -> Value {
        json!({
            "access_token": access,
            "refresh_token": format!("refresh-{access}"),
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {"id": user_id, "email": "maria@mei.com.br"}
        })
    }

    fn jwt(exp: u64) -> String {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = Base64UrlUnpadded::encode_string(
            json!({"sub": "7f1c", "exp": exp}).to_string().as_bytes(),
        );
        format!("{header}.{claims}.signature")
    }

    fn seed_session(store: &GoTrueStore, access: &str, expires_at: u64) {
        store
            .save_session(&Session {
                user_id: Some("7f1c".to_string()),
                email: None,
                access_token: secret(access),
                refresh_token: secret("stored-refresh"),
                expires_at: Some(expires_at),
            })
            .unwrap();
    }

    #[test]
    fn jwt_expiry_reads_exp_claim() {
        assert_eq!(jwt_expiry(&jwt(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(jwt_expiry("opaque-token"), None);
    }

    #[test]
    fn expiry_margin_applies() {
        assert!(expires_soon(Some(1_030), 1_000));
        assert!(!expires_soon(Some(2_000), 1_000));
        assert!(!expires_soon(None, 1_000));
    }

    #[tokio::test]
    async fn sign_in_persists_and_notifies() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_partial_json(json!({"email": "maria@mei.com.br"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "7f1c")))
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        let mut subscription = store.subscribe();
        let session = store
            .sign_in_with_password("maria@mei.com.br", &secret("hunter22"))
            .await?;

        assert_eq!(session.user_id.as_deref(), Some("7f1c"));
        let current = store.current_session().await?.unwrap();
        assert_eq!(current.access_token.expose_secret(), "at-1");
        let change = subscription.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_rejection_carries_backend_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        let err = store
            .sign_in_with_password("maria@mei.com.br", &secret("wrong"))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Rejected("Invalid login credentials".to_string()));
    }

    #[tokio::test]
    async fn expired_session_is_refreshed() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_partial_json(json!({"refresh_token": "stored-refresh"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", "7f1c")))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        seed_session(&store, "at-old", 0);

        let session = store.current_session().await?.unwrap();
        assert_eq!(session.access_token.expose_secret(), "at-2");
        Ok(())
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .mount(&server)
            .await;

        let (store, storage) = store(&server);
        seed_session(&store, "at-old", 0);

        assert!(store.current_session().await?.is_none());
        assert!(storage.get(&store.storage_keys().session)?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_during_refresh_is_not_undone() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("at-late", "7f1c"))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (store, storage) = store(&server);
        seed_session(&store, "at-old", 0);
        let mut subscription = store.subscribe();

        let (refreshed, signed_out) = tokio::join!(store.current_session(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.sign_out().await
        });
        signed_out?;

        assert!(refreshed?.is_none());
        assert!(storage.get(&store.storage_keys().session)?.is_none());
        let change = subscription.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedOut);
        let late = tokio::time::timeout(Duration::from_millis(100), subscription.recv()).await;
        assert!(late.is_err(), "no change may follow the sign-out");
        Ok(())
    }

    #[tokio::test]
    async fn recovery_code_round_trip_uses_stored_verifier() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/recover"))
            .and(query_param("redirect_to", "https://portal.test/"))
            .and(body_partial_json(json!({"code_challenge_method": "s256"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .and(body_partial_json(json!({"auth_code": "c0de"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-r", "7f1c")))
            .mount(&server)
            .await;

        let (store, storage) = store(&server);
        store
            .send_password_reset_email("maria@mei.com.br", &Url::parse("https://portal.test/")?)
            .await?;

        let entry = storage.get(&store.storage_keys().code_verifier)?.unwrap();
        let (verifier, is_recovery) = pkce::parse_entry(&entry);
        assert!(is_recovery);

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body)?;
        assert_eq!(
            sent["code_challenge"],
            json!(pkce::challenge_for(verifier.expose_secret()))
        );

        let mut subscription = store.subscribe();
        store.exchange_recovery_code(&secret("c0de")).await?;

        let requests = server.received_requests().await.unwrap();
        let exchanged: Value = serde_json::from_slice(&requests[1].body)?;
        assert_eq!(exchanged["code_verifier"], json!(verifier.expose_secret()));
        assert!(storage.get(&store.storage_keys().code_verifier)?.is_none());
        assert_eq!(
            subscription.recv().await.unwrap().event,
            AuthEvent::PasswordRecovery
        );
        assert!(store.current_session().await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn exchange_without_verifier_is_rejected() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let (store, _) = store(&server);

        let err = store
            .exchange_recovery_code(&secret("c0de"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_token_pair_is_validated_against_user_endpoint() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let access = jwt(unix_now() + 3_600);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", format!("Bearer {access}").as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "7f1c", "email": null})),
            )
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        store
            .set_session_from_tokens(&secret(&access), &secret("rt"))
            .await?;

        let session = store.current_session().await?.unwrap();
        assert_eq!(session.user_id.as_deref(), Some("7f1c"));
        assert_eq!(session.refresh_token.expose_secret(), "rt");
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_pair_falls_back_to_refresh() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_partial_json(json!({"refresh_token": "rt"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-new", "7f1c")))
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        store
            .set_session_from_tokens(&secret(&jwt(10)), &secret("rt"))
            .await?;

        let session = store.current_session().await?.unwrap();
        assert_eq!(session.access_token.expose_secret(), "at-new");
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_clears_local_state_when_remote_fails() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        seed_session(&store, "at-1", unix_now() + 3_600);

        store.sign_out().await?;
        assert!(store.current_session().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn update_password_requires_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let (store, _) = store(&server);

        let err = store.update_password(&secret("secret1")).await.unwrap_err();
        assert_eq!(err, StoreError::MissingSession);
    }

    #[tokio::test]
    async fn update_password_uses_session_token() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", "Bearer at-1"))
            .and(body_partial_json(json!({"password": "secret1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "7f1c", "email": "maria@mei.com.br"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        seed_session(&store, "at-1", unix_now() + 3_600);

        store.update_password(&secret("secret1")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn admin_lookup_matches_rows() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/portal_admins"))
            .and(query_param("user_id", "eq.7f1c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"user_id": "7f1c"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/portal_admins"))
            .and(query_param("user_id", "eq.other"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        assert!(store.is_user_authorized_admin("7f1c").await?);
        assert!(!store.is_user_authorized_admin("other").await?);
        Ok(())
    }

    #[tokio::test]
    async fn admin_lookup_outage_is_an_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/portal_admins"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (store, _) = store(&server);
        let err = store.is_user_authorized_admin("7f1c").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
