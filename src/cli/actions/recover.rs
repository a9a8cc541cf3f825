use crate::{
    cli::globals::PortalConfig,
    portal::{
        AuthError, History, Liveness, MemoryHistory, RecoveryExchanger, RecoveryFlow,
        RecoveryStatus, Route,
    },
};
use anyhow::{Result, bail};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub struct Args {
    pub config: PortalConfig,
    pub url: Url,
    pub new_password: SecretString,
    pub confirmation: SecretString,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("config", &self.config)
            .field("url", &"***")
            .field("new_password", &"***")
            .field("confirmation", &"***")
            .finish()
    }
}

/// Exchanges the link's credential for a session, then sets the new password
/// and closes the recovery session.
/// # Errors
/// Returns an error if the URL is not a recovery link, no session could be
/// established, or the password update is rejected.
pub async fn execute(args: Args) -> Result<()> {
    let route = args.config.classifier.classify(&args.url, false);
    if route != Route::Recovery {
        bail!("not a recovery link (classified as {route})");
    }

    let store = args.config.session_store()?;
    let history = Arc::new(MemoryHistory::new(args.url));
    let exchanger = RecoveryExchanger::new(store, Arc::clone(&history) as Arc<dyn History>);
    let mut flow = RecoveryFlow::new(exchanger, Liveness::new());

    let status = flow.start().await?;
    debug!(?status, "recovery exchange finished");
    if status != RecoveryStatus::Ready {
        return Err(AuthError::RecoveryCredentialInvalid.into());
    }

    flow.submit(&args.new_password, &args.confirmation).await?;
    println!("Password updated. Sign in again at {}", history.location());
    Ok(())
}
