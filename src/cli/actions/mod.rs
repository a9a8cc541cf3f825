pub mod forgot;
pub mod login;
pub mod logout;
pub mod recover;
pub mod route;
pub mod status;

// The match over actions lives in `run` so this file only lists them.
mod run;

#[derive(Debug)]
pub enum Action {
    Route(route::Args),
    Login(login::Args),
    Forgot(forgot::Args),
    Recover(recover::Args),
    Status(status::Args),
    Logout(logout::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
