use crate::{cli::globals::PortalConfig, portal::SessionStore};
use anyhow::{Context, Result};

#[derive(Debug)]
pub struct Args {
    pub config: PortalConfig,
}

/// # Errors
/// Returns an error if the local session could not be cleared.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.config.session_store()?;
    store.sign_out().await.context("failed to sign out")?;
    println!("Signed out");
    Ok(())
}
