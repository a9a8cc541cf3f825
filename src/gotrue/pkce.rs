//! PKCE material for recovery links.
//!
//! The verifier is kept in session storage, suffixed with the flow it belongs
//! to; only its S256 challenge travels with the reset request.

use super::error::GoTrueError;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

pub const CHALLENGE_METHOD: &str = "s256";
const RECOVERY_SUFFIX: &str = "/PASSWORD_RECOVERY";

pub struct PkcePair {
    pub verifier: SecretString,
    pub challenge: String,
}

/// # Errors
/// [`GoTrueError::Config`] if the OS random source fails.
pub fn generate() -> Result<PkcePair, GoTrueError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| GoTrueError::Config(format!("failed to generate PKCE verifier: {err}")))?;
    let verifier = Base64UrlUnpadded::encode_string(&bytes);
    let challenge = challenge_for(&verifier);
    Ok(PkcePair {
        verifier: SecretString::from(verifier),
        challenge,
    })
}

#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

/// Storage form of a verifier issued for a password recovery.
#[must_use]
pub fn recovery_entry(verifier: &SecretString) -> String {
    format!("{}{RECOVERY_SUFFIX}", verifier.expose_secret())
}

/// Splits a stored entry into the verifier and whether it was issued for a
/// password recovery.
#[must_use]
pub fn parse_entry(entry: &str) -> (SecretString, bool) {
    match entry.strip_suffix(RECOVERY_SUFFIX) {
        Some(verifier) => (SecretString::from(verifier.to_string()), true),
        None => (SecretString::from(entry.to_string()), false),
    }
}
