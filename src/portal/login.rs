use super::{
    error::AuthError,
    history::site_root,
    store::{Session, SessionStore, StoreError},
};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

const SIGN_IN_FAILED: &str = "Could not sign in. Check your e-mail and password.";
const RESET_FAILED: &str = "Could not send the recovery e-mail. Try again.";

/// Sign-in and forgot-password submissions of the login view.
#[derive(Clone)]
pub struct LoginFlow {
    store: Arc<dyn SessionStore>,
    site_url: Url,
}

impl LoginFlow {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, site_url: Url) -> Self {
        Self { store, site_url }
    }

    /// Where recovery e-mails send the user back to. A bare site root keeps
    /// the link on a route the classifier reads as recovery.
    #[must_use]
    pub fn recovery_redirect(&self) -> Url {
        site_root(&self.site_url)
    }

    /// # Errors
    /// [`AuthError::SignInRejected`] carrying the backend's message, or a
    /// generic one when the backend gave none.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.expose_secret().is_empty() {
            return Err(AuthError::SignInRejected(
                "E-mail and password are required.".to_string(),
            ));
        }

        match self.store.sign_in_with_password(email, password).await {
            Ok(session) => {
                debug!("Signed in");
                Ok(session)
            }
            Err(StoreError::Rejected(message)) if !message.trim().is_empty() => {
                Err(AuthError::SignInRejected(message))
            }
            Err(err) => {
                warn!("Sign-in failed: {err}");
                Err(AuthError::SignInRejected(SIGN_IN_FAILED.to_string()))
            }
        }
    }

    /// # Errors
    /// [`AuthError::ResetRequestFailed`] for a malformed address or a failed
    /// request.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(AuthError::ResetRequestFailed(
                "Enter a valid e-mail address.".to_string(),
            ));
        }

        let redirect_to = self.recovery_redirect();
        self.store
            .send_password_reset_email(email, &redirect_to)
            .await
            .map_err(|err| {
                warn!("Password reset request failed: {err}");
                match err {
                    StoreError::Rejected(message) if !message.trim().is_empty() => {
                        AuthError::ResetRequestFailed(message)
                    }
                    _ => AuthError::ResetRequestFailed(RESET_FAILED.to_string()),
                }
            })
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::portal::test_support::FakeStore;

    fn flow(store: &Arc<FakeStore>) -> LoginFlow {
        LoginFlow::new(
            Arc::clone(store) as Arc<dyn SessionStore>,
            Url::parse("https://portal.test/app/login?next=1").unwrap(),
        )
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("cliente@mei.com.br"));
        assert!(!valid_email("cliente"));
        assert!(!valid_email("cli ente@mei.com"));
    }

    #[tokio::test]
    async fn sign_in_trims_the_email() {
        let store = FakeStore::new();
        let session = flow(&store)
            .sign_in("  maria@mei.com.br ", &secret("hunter22"))
            .await
            .unwrap();

        assert_eq!(session.user_id.as_deref(), Some("maria"));
        assert_eq!(store.calls(), vec!["sign_in:maria@mei.com.br".to_string()]);
    }

    #[tokio::test]
    async fn backend_message_is_verbatim() {
        let store = FakeStore::new();
        store.reject_sign_in(StoreError::Rejected("Invalid login credentials".to_string()));

        let err = flow(&store)
            .sign_in("maria@mei.com.br", &secret("wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn outage_gets_generic_message() {
        let store = FakeStore::new();
        store.reject_sign_in(StoreError::Unavailable("connection refused".to_string()));

        let err = flow(&store)
            .sign_in("maria@mei.com.br", &secret("hunter22"))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::SignInRejected(SIGN_IN_FAILED.to_string()));
    }

    #[tokio::test]
    async fn empty_fields_never_reach_the_store() {
        let store = FakeStore::new();
        assert!(flow(&store).sign_in("   ", &secret("x")).await.is_err());
        assert!(flow(&store).sign_in("a@b.co", &secret("")).await.is_err());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn reset_redirects_to_site_root() {
        let store = FakeStore::new();
        flow(&store)
            .request_password_reset(" maria@mei.com.br")
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["reset:maria@mei.com.br:https://portal.test/".to_string()]
        );
    }

    #[tokio::test]
    async fn reset_rejects_malformed_address() {
        let store = FakeStore::new();
        let err = flow(&store)
            .request_password_reset("maria")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ResetRequestFailed(_)));
        assert!(store.calls().is_empty());
    }
}
