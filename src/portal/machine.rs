//! Session/role state machine.
//!
//! Pure and synchronous: [`AuthMachine::handle`] takes one [`Input`] and
//! returns the [`Command`]s the driver must execute. Role lookups carry the
//! [`SessionEpoch`] they were issued under so a result for a superseded
//! session is discarded no matter when it arrives.

use super::{
    error::AuthError,
    store::{AuthEvent, Session, SessionChange, StoreError},
};
use std::fmt;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Unknown,
    Admin,
    NonAdmin,
}

#[derive(Clone, Debug)]
pub enum AuthState {
    Initializing,
    Unauthenticated,
    Authenticated { session: Session, role: Role },
    /// The owner was torn down; every further input is ignored.
    Terminated,
}

impl AuthState {
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        match self {
            Self::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated { .. } => "authenticated",
            Self::Terminated => "terminated",
        }
    }
}

#[derive(Debug)]
pub enum Input {
    /// Result of the mount-time session read.
    SessionFetched(Result<Option<Session>, StoreError>),
    SessionChanged(SessionChange),
    RoleResolved {
        epoch: SessionEpoch,
        result: Result<bool, StoreError>,
    },
    SignOutRequested,
    TornDown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ResolveRole {
        epoch: SessionEpoch,
        user_id: String,
    },
    SignOut,
    Unsubscribe,
}

#[derive(Debug)]
pub struct AuthMachine {
    state: AuthState,
    epoch: SessionEpoch,
    recovery_signaled: bool,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AuthState::Initializing,
            epoch: SessionEpoch(0),
            recovery_signaled: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    #[must_use]
    pub const fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    /// Whether a `PASSWORD_RECOVERY` notification was seen since the last
    /// explicit navigation.
    #[must_use]
    pub const fn recovery_signaled(&self) -> bool {
        self.recovery_signaled
    }

    pub fn clear_recovery_signal(&mut self) {
        self.recovery_signaled = false;
    }

    pub fn handle(&mut self, input: Input) -> Vec<Command> {
        if matches!(self.state, AuthState::Terminated) {
            debug!("Ignoring input after teardown: {input:?}");
            return Vec::new();
        }

        match input {
            Input::SessionFetched(result) => self.on_session_fetched(result),
            Input::SessionChanged(change) => self.on_session_changed(change),
            Input::RoleResolved { epoch, result } => {
                self.on_role_resolved(epoch, result);
                Vec::new()
            }
            Input::SignOutRequested => self.on_sign_out(),
            Input::TornDown => {
                self.state = AuthState::Terminated;
                self.epoch = self.epoch.next();
                vec![Command::Unsubscribe]
            }
        }
    }

    fn on_session_fetched(&mut self, result: Result<Option<Session>, StoreError>) -> Vec<Command> {
        // A change notification already settled the state and is newer.
        if !matches!(self.state, AuthState::Initializing) {
            debug!("Discarding initial session read, state already {}", self.state.name());
            return Vec::new();
        }

        match result {
            Ok(session) => self.adopt(session),
            Err(err) => {
                warn!("{}", AuthError::SessionFetch(err));
                self.adopt(None)
            }
        }
    }

    fn on_session_changed(&mut self, change: SessionChange) -> Vec<Command> {
        debug!("Session change: {}", change.event);
        match change.event {
            AuthEvent::SignedOut => self.adopt(None),
            AuthEvent::PasswordRecovery => {
                self.recovery_signaled = true;
                self.adopt(change.session)
            }
            _ => self.adopt(change.session),
        }
    }

    fn adopt(&mut self, session: Option<Session>) -> Vec<Command> {
        let Some(session) = session else {
            if !matches!(self.state, AuthState::Unauthenticated) {
                self.state = AuthState::Unauthenticated;
                self.epoch = self.epoch.next();
            }
            return Vec::new();
        };

        if let AuthState::Authenticated { session: current, .. } = &mut self.state
            && current.same_identity(&session)
        {
            *current = session;
            return Vec::new();
        }

        self.epoch = self.epoch.next();
        match session.user_id.clone() {
            Some(user_id) => {
                self.state = AuthState::Authenticated {
                    session,
                    role: Role::Unknown,
                };
                vec![Command::ResolveRole {
                    epoch: self.epoch,
                    user_id,
                }]
            }
            None => {
                self.state = AuthState::Authenticated {
                    session,
                    role: Role::NonAdmin,
                };
                Vec::new()
            }
        }
    }

    fn on_role_resolved(&mut self, epoch: SessionEpoch, result: Result<bool, StoreError>) {
        if epoch != self.epoch {
            debug!("Discarding role lookup for epoch {epoch}, current is {}", self.epoch);
            return;
        }
        let AuthState::Authenticated { role, .. } = &mut self.state else {
            return;
        };

        *role = match result {
            Ok(true) => Role::Admin,
            Ok(false) => Role::NonAdmin,
            // Fail closed
            Err(err) => {
                warn!("{}", AuthError::AuthorizationLookup(err));
                Role::NonAdmin
            }
        };
    }

    fn on_sign_out(&mut self) -> Vec<Command> {
        if matches!(self.state, AuthState::Unauthenticated) {
            return Vec::new();
        }
        self.state = AuthState::Unauthenticated;
        self.epoch = self.epoch.next();
        vec![Command::SignOut]
    }
}
