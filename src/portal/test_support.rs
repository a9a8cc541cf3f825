//! Scripted in-memory [`SessionStore`] for exercising the portal flows.

#![allow(clippy::unwrap_used)]

use super::store::{
    AuthEvent, Session, SessionNotifier, SessionStore, StoreError, Subscription,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;
use url::Url;

pub fn session(user_id: &str) -> Session {
    Session {
        user_id: Some(user_id.to_string()),
        email: Some(format!("{user_id}@portal.test")),
        access_token: SecretString::from(format!("access-{user_id}")),
        refresh_token: SecretString::from(format!("refresh-{user_id}")),
        expires_at: None,
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub notifier: SessionNotifier,
    session: Mutex<Option<Session>>,
    fetch_error: Mutex<Option<StoreError>>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    admins: Mutex<HashMap<String, Result<bool, StoreError>>>,
    admin_gates: Mutex<HashMap<String, Arc<Notify>>>,
    sign_in_error: Mutex<Option<StoreError>>,
    exchange_outcome: Mutex<Option<Result<Session, StoreError>>>,
    token_outcome: Mutex<Option<Result<Session, StoreError>>>,
    update_error: Mutex<Option<StoreError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_session(session: Session) -> Arc<Self> {
        let store = Self::new();
        store.set_session(Some(session));
        store
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn fail_fetch(&self, err: StoreError) {
        *self.fetch_error.lock().unwrap() = Some(err);
    }

    /// Holds every `current_session` call until the returned gate is opened
    /// with `notify_one`.
    pub fn gate_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_admin(&self, user_id: &str, answer: Result<bool, StoreError>) {
        self.admins
            .lock()
            .unwrap()
            .insert(user_id.to_string(), answer);
    }

    pub fn gate_admin(&self, user_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.admin_gates
            .lock()
            .unwrap()
            .insert(user_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn reject_sign_in(&self, err: StoreError) {
        *self.sign_in_error.lock().unwrap() = Some(err);
    }

    /// What a code exchange installs; unset means the exchange is rejected.
    pub fn on_exchange(&self, outcome: Result<Session, StoreError>) {
        *self.exchange_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn on_token_pair(&self, outcome: Result<Session, StoreError>) {
        *self.token_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn reject_update(&self, err: StoreError) {
        *self.update_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn install(&self, outcome: Option<Result<Session, StoreError>>) -> Result<(), StoreError> {
        match outcome {
            Some(Ok(session)) => {
                self.set_session(Some(session.clone()));
                self.notifier
                    .notify(AuthEvent::PasswordRecovery, Some(session));
                Ok(())
            }
            Some(Err(err)) => Err(err),
            None => Err(StoreError::Rejected("invalid grant".to_string())),
        }
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        self.record("current_session");
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &SecretString,
    ) -> Result<Session, StoreError> {
        self.record(format!("sign_in:{email}"));
        if let Some(err) = self.sign_in_error.lock().unwrap().clone() {
            return Err(err);
        }
        let signed_in = session(email.split('@').next().unwrap_or(email));
        self.set_session(Some(signed_in.clone()));
        self.notifier
            .notify(AuthEvent::SignedIn, Some(signed_in.clone()));
        Ok(signed_in)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.record("sign_out");
        self.set_session(None);
        self.notifier.notify(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &Url,
    ) -> Result<(), StoreError> {
        self.record(format!("reset:{email}:{redirect_to}"));
        Ok(())
    }

    async fn exchange_recovery_code(&self, code: &SecretString) -> Result<(), StoreError> {
        self.record(format!("exchange:{}", code.expose_secret()));
        let outcome = self.exchange_outcome.lock().unwrap().take();
        self.install(outcome)
    }

    async fn set_session_from_tokens(
        &self,
        access_token: &SecretString,
        _refresh_token: &SecretString,
    ) -> Result<(), StoreError> {
        self.record(format!("set_session:{}", access_token.expose_secret()));
        let outcome = self.token_outcome.lock().unwrap().take();
        self.install(outcome)
    }

    async fn update_password(&self, _new_password: &SecretString) -> Result<(), StoreError> {
        self.record("update_password");
        if self.session.lock().unwrap().is_none() {
            return Err(StoreError::MissingSession);
        }
        if let Some(err) = self.update_error.lock().unwrap().clone() {
            return Err(err);
        }
        let current = self.session.lock().unwrap().clone();
        self.notifier.notify(AuthEvent::UserUpdated, current);
        Ok(())
    }

    async fn is_user_authorized_admin(&self, user_id: &str) -> Result<bool, StoreError> {
        self.record(format!("is_admin:{user_id}"));
        let gate = self.admin_gates.lock().unwrap().get(user_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.admins
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or(Ok(false))
    }
}
