use crate::{cli::globals::PortalConfig, portal::LoginFlow};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub config: PortalConfig,
    pub email: String,
    pub password: SecretString,
}

/// Signs in and leaves the session in the session file.
/// # Errors
/// Returns the backend's message if the credentials are rejected.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.config.session_store()?;
    let flow = LoginFlow::new(store, args.config.site_url.clone());

    let session = flow.sign_in(&args.email, &args.password).await?;
    info!(
        session_file = %args.config.session_file.display(),
        "session persisted"
    );

    let who = session
        .email
        .as_deref()
        .or(session.user_id.as_deref())
        .unwrap_or(args.email.trim());
    println!("Signed in as {who}");
    Ok(())
}
