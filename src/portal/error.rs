use super::store::StoreError;
use thiserror::Error;

/// Failures of the portal auth flows. User-facing variants render as inline
/// text next to the relevant form; none of them is a full-screen error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Reading the initial session failed; the portal falls back to logged out.
    #[error("could not read the current session: {0}")]
    SessionFetch(#[source] StoreError),
    #[error("{0}")]
    SignInRejected(String),
    #[error("Recovery session is missing or expired. Request a new recovery link.")]
    RecoveryCredentialInvalid,
    #[error("{0}")]
    PasswordUpdateRejected(String),
    #[error("{0}")]
    ResetRequestFailed(String),
    /// Logged only: the user simply gets the non-admin experience.
    #[error("admin authorization lookup failed: {0}")]
    AuthorizationLookup(#[source] StoreError),
    /// The owner of the operation was torn down before it finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether the user can fix this by submitting the form again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SignInRejected(_) | Self::PasswordUpdateRejected(_) | Self::ResetRequestFailed(_)
        )
    }
}
