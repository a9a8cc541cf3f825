use crate::cli::actions::{Action, forgot, login, logout, recover, route, status};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Route(args) => {
            route::execute(&args);
            Ok(())
        }
        Action::Login(args) => login::execute(args).await,
        Action::Forgot(args) => forgot::execute(args).await,
        Action::Recover(args) => recover::execute(args).await,
        Action::Status(args) => status::execute(args).await,
        Action::Logout(args) => logout::execute(args).await,
    }
}
