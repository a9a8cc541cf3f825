//! Password recovery: turn the link's credential into a session, then let the
//! user pick a new password.

use super::{
    error::AuthError,
    history::{History, without_query_and_fragment},
    liveness::Liveness,
    route::RecoveryCredential,
    store::{Session, SessionStore, StoreError},
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

const MISSING_SESSION: &str = "Recovery session is missing. Request a new recovery link.";
const UPDATE_FAILED: &str = "Could not update the password.";

/// Converts recovery credential material into an active session.
#[derive(Clone)]
pub struct RecoveryExchanger {
    store: Arc<dyn SessionStore>,
    history: Arc<dyn History>,
}

impl RecoveryExchanger {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, history: Arc<dyn History>) -> Self {
        Self { store, history }
    }

    /// Establishes the recovery session.
    ///
    /// An existing session wins. Otherwise the link's credentials are tried
    /// in order (exchange code, then fragment token pair); after each
    /// submission the store is asked again and only a confirmed session
    /// counts. The consumed material is stripped from the URL only after that
    /// confirmation. Returns [`AuthError::Cancelled`] without touching the URL
    /// if `liveness` is cleared mid-way.
    ///
    /// # Errors
    /// [`AuthError::RecoveryCredentialInvalid`] when no credential yields a
    /// session.
    #[instrument(skip_all)]
    pub async fn establish(&self, liveness: &Liveness) -> Result<Session, AuthError> {
        match self.store.current_session().await {
            Ok(Some(session)) => {
                ensure_alive(liveness)?;
                debug!("Recovery session already established");
                return Ok(session);
            }
            Ok(None) => {}
            Err(err) => warn!("{}", AuthError::SessionFetch(err)),
        }
        ensure_alive(liveness)?;

        for credential in RecoveryCredential::candidates(&self.history.location()) {
            if let Err(err) = self.submit(&credential).await {
                warn!("Recovery credential {credential:?} rejected: {err}");
            }
            ensure_alive(liveness)?;

            let confirmed = match self.store.current_session().await {
                Ok(session) => session,
                Err(err) => {
                    warn!("Recovery session re-check failed: {err}");
                    None
                }
            };
            ensure_alive(liveness)?;

            if let Some(session) = confirmed {
                let location = self.history.location();
                self.history.replace(credential.strip_from(&location));
                debug!("Recovery session confirmed, credential removed from the URL");
                return Ok(session);
            }
        }

        Err(AuthError::RecoveryCredentialInvalid)
    }

    async fn submit(&self, credential: &RecoveryCredential) -> Result<(), StoreError> {
        match credential {
            RecoveryCredential::ExchangeCode(code) => self.store.exchange_recovery_code(code).await,
            RecoveryCredential::TokenPair {
                access_token,
                refresh_token,
            } => {
                self.store
                    .set_session_from_tokens(access_token, refresh_token)
                    .await
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryStatus {
    Checking,
    /// Session established; the password form is shown.
    Ready,
    /// No session could be established. Terminal for the page load.
    Invalid,
    /// Password changed and the recovery session closed.
    Completed,
}

/// State of the recovery view for one page load.
pub struct RecoveryFlow {
    exchanger: RecoveryExchanger,
    liveness: Liveness,
    status: RecoveryStatus,
}

impl RecoveryFlow {
    #[must_use]
    pub fn new(exchanger: RecoveryExchanger, liveness: Liveness) -> Self {
        Self {
            exchanger,
            liveness,
            status: RecoveryStatus::Checking,
        }
    }

    #[must_use]
    pub const fn status(&self) -> RecoveryStatus {
        self.status
    }

    /// Runs the exchange once. Later calls return the settled status.
    ///
    /// # Errors
    /// [`AuthError::Cancelled`] if the flow was torn down while the exchange
    /// was in flight; the status stays `Checking`.
    pub async fn start(&mut self) -> Result<RecoveryStatus, AuthError> {
        if self.status != RecoveryStatus::Checking {
            return Ok(self.status);
        }

        self.status = match self.exchanger.establish(&self.liveness).await {
            Ok(_) => RecoveryStatus::Ready,
            Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
            Err(err) => {
                warn!("{err}");
                RecoveryStatus::Invalid
            }
        };
        Ok(self.status)
    }

    /// Sets the new password, closes the recovery session and cleans the URL
    /// down to `origin + path`.
    ///
    /// # Errors
    /// [`AuthError::PasswordUpdateRejected`] with a user-facing message.
    #[instrument(skip_all)]
    pub async fn submit(
        &mut self,
        new_password: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), AuthError> {
        if self.status != RecoveryStatus::Ready {
            return Err(rejected(MISSING_SESSION));
        }

        let password = new_password.expose_secret();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(rejected(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        if password != confirmation.expose_secret() {
            return Err(rejected("Passwords do not match."));
        }

        let store = &self.exchanger.store;
        store.update_password(new_password).await.map_err(|err| match err {
            StoreError::Rejected(message) if !message.trim().is_empty() => {
                AuthError::PasswordUpdateRejected(message)
            }
            StoreError::MissingSession => rejected(MISSING_SESSION),
            other => {
                warn!("Password update failed: {other}");
                rejected(UPDATE_FAILED)
            }
        })?;
        ensure_alive(&self.liveness)?;

        if let Err(err) = store.sign_out().await {
            warn!("Failed to close the recovery session: {err}");
        }
        ensure_alive(&self.liveness)?;

        let history = &self.exchanger.history;
        history.replace(without_query_and_fragment(&history.location()));
        self.status = RecoveryStatus::Completed;
        Ok(())
    }
}

fn rejected(message: &str) -> AuthError {
    AuthError::PasswordUpdateRejected(message.to_string())
}

fn ensure_alive(liveness: &Liveness) -> Result<(), AuthError> {
    if liveness.is_alive() {
        Ok(())
    } else {
        Err(AuthError::Cancelled)
    }
}
