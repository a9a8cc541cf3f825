use crate::{cli::globals::PortalConfig, portal::LoginFlow};
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub config: PortalConfig,
    pub email: String,
}

/// Sends the recovery e-mail. The PKCE verifier stays in the session file,
/// so `recover` must run with the same file.
/// # Errors
/// Returns an error if the address is malformed or the backend refuses.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.config.session_store()?;
    let flow = LoginFlow::new(store, args.config.site_url.clone());

    flow.request_password_reset(&args.email).await?;
    println!(
        "Recovery e-mail requested for {}; the link returns to {}",
        args.email.trim(),
        flow.recovery_redirect()
    );
    Ok(())
}
