use crate::portal::route::{AdminRouteScheme, DEFAULT_ADMIN_PREFIX, RouteClassifier};
use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command, builder::PossibleValuesParser};

pub const ARG_ROUTING: &str = "routing";
pub const ARG_ADMIN_PREFIX: &str = "admin-prefix";

#[derive(Debug, Clone)]
pub struct Options {
    pub scheme: AdminRouteScheme,
    pub admin_prefix: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the routing scheme is unknown.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let scheme = matches
            .get_one::<String>(ARG_ROUTING)
            .map_or(Ok(AdminRouteScheme::default()), |value| value.parse())
            .map_err(|err: String| anyhow!(err))?;
        let admin_prefix = matches
            .get_one::<String>(ARG_ADMIN_PREFIX)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADMIN_PREFIX.to_string());
        Ok(Self {
            scheme,
            admin_prefix,
        })
    }

    #[must_use]
    pub fn classifier(&self) -> RouteClassifier {
        RouteClassifier::new(self.scheme, &self.admin_prefix)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ROUTING)
                .long(ARG_ROUTING)
                .help("Where the admin area lives: URL path or hash path")
                .env("MEIPORTAL_ROUTING")
                .default_value("path")
                .value_parser(PossibleValuesParser::new(["path", "hash"]))
                .global(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_PREFIX)
                .long(ARG_ADMIN_PREFIX)
                .help("Path prefix of the admin area")
                .env("MEIPORTAL_ADMIN_PREFIX")
                .default_value(DEFAULT_ADMIN_PREFIX)
                .global(true),
        )
}
