use crate::portal::history::site_root;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, builder::ValueParser};
use regex::Regex;
use secrecy::SecretString;
use std::path::PathBuf;
use url::Url;

pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_ANON_KEY: &str = "anon-key";
pub const ARG_ADMIN_TABLE: &str = "admin-table";
pub const ARG_SITE_URL: &str = "site-url";
pub const ARG_SESSION_FILE: &str = "session-file";

pub const DEFAULT_ADMIN_TABLE: &str = "admin_users";
pub const DEFAULT_SESSION_FILE: &str = ".meiportal/session.json";

/// Admin table names end up in a PostgREST path, so only plain identifiers
/// are accepted.
#[must_use]
pub fn validator_table_name() -> ValueParser {
    ValueParser::from(move |name: &str| -> std::result::Result<String, String> {
        if Regex::new(r"^[A-Za-z0-9_]+$").is_ok_and(|regex| regex.is_match(name)) {
            Ok(name.to_string())
        } else {
            Err("table name may only contain letters, digits and underscores".to_string())
        }
    })
}

#[derive(Clone)]
pub struct Options {
    pub auth_url: Url,
    pub anon_key: SecretString,
    pub admin_table: String,
    pub site_url: Url,
    pub session_file: PathBuf,
}

impl Options {
    /// Parse backend arguments from matches. The site URL defaults to the
    /// origin of the auth URL.
    ///
    /// # Errors
    /// Returns an error if the auth URL or anon key is missing, or a URL does
    /// not parse.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let auth_url = get_non_empty(ARG_AUTH_URL)
            .with_context(|| format!("missing required argument: --{ARG_AUTH_URL}"))?;
        let auth_url = Url::parse(&auth_url).context("invalid MEIPORTAL_AUTH_URL")?;

        let anon_key = get_non_empty(ARG_ANON_KEY)
            .with_context(|| format!("missing required argument: --{ARG_ANON_KEY}"))?;

        let site_url = match get_non_empty(ARG_SITE_URL) {
            Some(value) => Url::parse(&value).context("invalid MEIPORTAL_SITE_URL")?,
            None => site_root(&auth_url),
        };

        Ok(Self {
            admin_table: get_non_empty(ARG_ADMIN_TABLE)
                .unwrap_or_else(|| DEFAULT_ADMIN_TABLE.to_string()),
            session_file: get_non_empty(ARG_SESSION_FILE)
                .map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from),
            auth_url,
            anon_key: SecretString::from(anon_key),
            site_url,
        })
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("auth_url", &self.auth_url.as_str())
            .field("anon_key", &"***")
            .field("admin_table", &self.admin_table)
            .field("site_url", &self.site_url.as_str())
            .field("session_file", &self.session_file)
            .finish()
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Supabase project URL, e.g. https://<project>.supabase.co")
                .env("MEIPORTAL_AUTH_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_ANON_KEY)
                .long(ARG_ANON_KEY)
                .help("Public anon key of the Supabase project")
                .env("MEIPORTAL_ANON_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_TABLE)
                .long(ARG_ADMIN_TABLE)
                .help("Table listing the user ids allowed into the admin area")
                .env("MEIPORTAL_ADMIN_TABLE")
                .default_value(DEFAULT_ADMIN_TABLE)
                .value_parser(validator_table_name())
                .global(true),
        )
        .arg(
            Arg::new(ARG_SITE_URL)
                .long(ARG_SITE_URL)
                .help("Public portal URL; recovery e-mails link back here")
                .long_help(concat!(
                    "Public portal URL. Recovery e-mails link back to its root.\n\n",
                    "Defaults to the origin of --auth-url."
                ))
                .env("MEIPORTAL_SITE_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("File holding the persisted session and PKCE verifier")
                .env("MEIPORTAL_SESSION_FILE")
                .default_value(DEFAULT_SESSION_FILE)
                .global(true),
        )
}
