//! Session store contract consumed by the portal core.
//!
//! The hosted identity service is an opaque collaborator: the controller, the
//! recovery exchanger and the login flows only talk to it through
//! [`SessionStore`]. Change notifications travel over a tokio broadcast channel
//! wrapped in a [`Subscription`] whose disposer runs exactly once.

use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use url::Url;

const NOTIFICATION_CAPACITY: usize = 16;

/// Authenticated identity held client-side. Token material is secret and is
/// redacted from `Debug` output.
#[derive(Clone)]
pub struct Session {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix seconds; `None` when the backend did not say.
    pub expires_at: Option<u64>,
}

impl Session {
    /// Two sessions share an identity when they carry the same user id.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Auth state change kinds delivered by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    /// The session was established from a password-recovery link.
    PasswordRecovery,
}

impl AuthEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct SessionChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend understood the request and refused it. The message is the
    /// backend's own and is safe to show to the user.
    #[error("{0}")]
    Rejected(String),
    #[error("no active session")]
    MissingSession,
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// Subscription to session change notifications.
///
/// `unsubscribe` may be called any number of times; the disposer runs once.
/// Dropping the subscription disposes it as well.
pub struct Subscription {
    receiver: broadcast::Receiver<SessionChange>,
    disposer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        receiver: broadcast::Receiver<SessionChange>,
        disposer: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            disposer: Some(Box::new(disposer)),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }

    /// Waits for the next notification. Returns `None` once unsubscribed or
    /// when the store has gone away.
    pub async fn recv(&mut self) -> Option<SessionChange> {
        while self.is_active() {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session change subscriber lagged, skipped {skipped} notifications");
                }
                Err(RecvError::Closed) => return None,
            }
        }
        None
    }

    /// Runs the disposer. Returns `true` only for the call that disposed.
    pub fn unsubscribe(&mut self) -> bool {
        match self.disposer.take() {
            Some(dispose) => {
                dispose();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Fan-out of session changes to every live [`Subscription`].
#[derive(Clone, Debug)]
pub struct SessionNotifier {
    sender: broadcast::Sender<SessionChange>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        let subscribers = Arc::clone(&self.subscribers);
        Subscription::new(self.sender.subscribe(), move || {
            subscribers.fetch_sub(1, Ordering::SeqCst);
        })
    }

    pub fn notify(&self, event: AuthEvent, session: Option<Session>) {
        // No receivers is fine: nobody is mounted yet.
        let _ = self.sender.send(SessionChange { event, session });
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// Contract of the hosted identity service.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, refreshed by the store if it expired.
    async fn current_session(&self) -> Result<Option<Session>, StoreError>;

    fn subscribe(&self) -> Subscription;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, StoreError>;

    async fn sign_out(&self) -> Result<(), StoreError>;

    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &Url,
    ) -> Result<(), StoreError>;

    async fn exchange_recovery_code(&self, code: &SecretString) -> Result<(), StoreError>;

    async fn set_session_from_tokens(
        &self,
        access_token: &SecretString,
        refresh_token: &SecretString,
    ) -> Result<(), StoreError>;

    async fn update_password(&self, new_password: &SecretString) -> Result<(), StoreError>;

    /// Whether `user_id` is in the admin authorization list. Callers must
    /// treat an error as "not an admin".
    async fn is_user_authorized_admin(&self, user_id: &str) -> Result<bool, StoreError>;
}
