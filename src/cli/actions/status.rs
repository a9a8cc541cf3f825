use crate::{
    cli::globals::PortalConfig,
    portal::{ControllerSnapshot, History, MemoryHistory, spawn},
};
use anyhow::{Result, bail};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub config: PortalConfig,
    pub url: Url,
    pub timeout: Duration,
}

fn render(snapshot: &ControllerSnapshot) -> String {
    let mut lines = vec![
        format!("route: {}", snapshot.navigation.route),
        format!("state: {}", snapshot.state.name()),
        format!("view: {}", snapshot.view),
    ];
    if let Some(session) = snapshot.state.session() {
        let who = session
            .email
            .as_deref()
            .or(session.user_id.as_deref())
            .unwrap_or("unknown");
        lines.push(format!("user: {who}"));
    }
    let actions: Vec<String> = snapshot.view.actions().iter().map(ToString::to_string).collect();
    if !actions.is_empty() {
        lines.push(format!("actions: {}", actions.join(", ")));
    }
    lines.join("\n")
}

/// Mounts the controller on `url` with the persisted session and prints the
/// view it settles on.
/// # Errors
/// Returns an error if the store cannot be built or nothing settles before
/// the timeout.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.config.session_store()?;
    let history: Arc<dyn History> = Arc::new(MemoryHistory::new(args.url));
    let handle = spawn(store, history, args.config.classifier.clone());

    let settled = timeout(args.timeout, handle.wait_for(ControllerSnapshot::is_settled)).await;
    let snapshot = match settled {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            handle.shutdown().await;
            bail!("controller stopped before settling");
        }
        Err(_) => {
            let last = handle.snapshot();
            handle.shutdown().await;
            bail!(
                "no view settled within {}s (state: {})",
                args.timeout.as_secs(),
                last.state.name()
            );
        }
    };

    debug!(view = %snapshot.view, "settled");
    println!("{}", render(&snapshot));
    handle.shutdown().await;
    Ok(())
}
