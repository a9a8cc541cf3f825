use crate::portal::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoTrueError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
    #[error("no active session")]
    MissingSession,
    #[error("no PKCE code verifier stored for this recovery link")]
    MissingCodeVerifier,
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl GoTrueError {
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if *status >= 400 && *status < 500)
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for GoTrueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout("Request timed out. Please try again.".to_string())
        } else if err.is_decode() {
            Self::Parse(format!("Failed to decode response: {err}"))
        } else {
            Self::Network(format!("Unable to reach the auth service: {err}"))
        }
    }
}

/// Client errors carry a message meant for the user; everything else is an
/// outage from the portal's point of view.
impl From<GoTrueError> for StoreError {
    fn from(err: GoTrueError) -> Self {
        match err {
            GoTrueError::Http { status, message } if (400..500).contains(&status) => {
                Self::Rejected(message)
            }
            GoTrueError::MissingSession => Self::MissingSession,
            GoTrueError::MissingCodeVerifier => Self::Rejected(
                "This recovery link was requested from another device or has already been used."
                    .to_string(),
            ),
            other => Self::Unavailable(other.to_string()),
        }
    }
}
