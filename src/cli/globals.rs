use crate::{
    cli::commands::{backend, routing},
    gotrue::{FileStorage, GoTrueStore, Transport},
    portal::RouteClassifier,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};
use url::Url;

/// Validated backend and routing configuration shared by every subcommand
/// that talks to the auth backend.
#[derive(Clone)]
pub struct PortalConfig {
    pub auth_url: Url,
    pub anon_key: SecretString,
    pub admin_table: String,
    pub site_url: Url,
    pub session_file: PathBuf,
    pub classifier: RouteClassifier,
}

impl PortalConfig {
    #[must_use]
    pub fn new(backend: backend::Options, routing: &routing::Options) -> Self {
        Self {
            auth_url: backend.auth_url,
            anon_key: backend.anon_key,
            admin_table: backend.admin_table,
            site_url: backend.site_url,
            session_file: backend.session_file,
            classifier: routing.classifier(),
        }
    }

    /// Builds the GoTrue session store, persisting to the session file.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn session_store(&self) -> Result<Arc<GoTrueStore>> {
        let transport = Transport::new(
            crate::APP_USER_AGENT,
            self.auth_url.clone(),
            self.anon_key.clone(),
        )
        .context("failed to build auth client")?;
        let storage = Arc::new(FileStorage::new(&self.session_file));
        Ok(Arc::new(GoTrueStore::new(
            transport,
            storage,
            self.admin_table.clone(),
        )))
    }
}

impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("auth_url", &self.auth_url.as_str())
            .field("anon_key", &"***")
            .field("admin_table", &self.admin_table)
            .field("site_url", &self.site_url.as_str())
            .field("session_file", &self.session_file)
            .field("classifier", &self.classifier)
            .finish()
    }
}
