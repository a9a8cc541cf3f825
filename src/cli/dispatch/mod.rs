//! Maps validated CLI matches to an [`Action`].

use crate::cli::{
    actions::{Action, forgot, login, logout, recover, route, status},
    commands::{
        ARG_CONFIRM_PASSWORD, ARG_EMAIL, ARG_NEW_PASSWORD, ARG_PASSWORD, ARG_TIMEOUT, ARG_URL,
        CMD_FORGOT, CMD_LOGIN, CMD_LOGOUT, CMD_RECOVER, CMD_ROUTE, CMD_STATUS, backend, routing,
    },
    globals::PortalConfig,
};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("missing required argument: --{id}"))
}

fn url(matches: &ArgMatches) -> Result<Url> {
    let raw = required(matches, ARG_URL)?;
    Url::parse(raw.trim()).with_context(|| format!("invalid --{ARG_URL}"))
}

fn config(matches: &ArgMatches) -> Result<PortalConfig> {
    let backend = backend::Options::parse(matches)?;
    let routing = routing::Options::parse(matches)?;
    Ok(PortalConfig::new(backend, &routing))
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("missing subcommand");
    };

    let action = match name {
        CMD_ROUTE => Action::Route(route::Args {
            url: url(sub)?,
            classifier: routing::Options::parse(sub)?.classifier(),
        }),
        CMD_LOGIN => Action::Login(login::Args {
            config: config(sub)?,
            email: required(sub, ARG_EMAIL)?.to_string(),
            password: SecretString::from(required(sub, ARG_PASSWORD)?.to_string()),
        }),
        CMD_FORGOT => Action::Forgot(forgot::Args {
            config: config(sub)?,
            email: required(sub, ARG_EMAIL)?.to_string(),
        }),
        CMD_RECOVER => {
            let new_password = required(sub, ARG_NEW_PASSWORD)?.to_string();
            let confirmation = sub
                .get_one::<String>(ARG_CONFIRM_PASSWORD)
                .cloned()
                .unwrap_or_else(|| new_password.clone());
            Action::Recover(recover::Args {
                config: config(sub)?,
                url: url(sub)?,
                new_password: SecretString::from(new_password),
                confirmation: SecretString::from(confirmation),
            })
        }
        CMD_STATUS => Action::Status(status::Args {
            config: config(sub)?,
            url: url(sub)?,
            timeout: Duration::from_secs(sub.get_one::<u64>(ARG_TIMEOUT).copied().unwrap_or(15)),
        }),
        CMD_LOGOUT => Action::Logout(logout::Args {
            config: config(sub)?,
        }),
        other => bail!("unknown subcommand: {other}"),
    };

    Ok(action)
}
