pub mod backend;
pub mod logging;
pub mod routing;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_ROUTE: &str = "route";
pub const CMD_LOGIN: &str = "login";
pub const CMD_FORGOT: &str = "forgot";
pub const CMD_RECOVER: &str = "recover";
pub const CMD_STATUS: &str = "status";
pub const CMD_LOGOUT: &str = "logout";

pub const ARG_URL: &str = "url";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_NEW_PASSWORD: &str = "new-password";
pub const ARG_CONFIRM_PASSWORD: &str = "confirm-password";
pub const ARG_TIMEOUT: &str = "timeout";

fn url_arg(help: &'static str) -> Arg {
    Arg::new(ARG_URL)
        .long(ARG_URL)
        .short('u')
        .help(help)
        .required(true)
}

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .long(ARG_EMAIL)
        .short('e')
        .help("Account e-mail address")
        .env("MEIPORTAL_EMAIL")
        .required(true)
}

fn subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_ROUTE)
                .about("Classify a portal URL as login, recovery, admin or app")
                .arg(url_arg("Portal URL to classify")),
        )
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Sign in with e-mail and password and persist the session")
                .arg(email_arg())
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .long(ARG_PASSWORD)
                        .help("Account password")
                        .env("MEIPORTAL_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_FORGOT)
                .about("Send a password recovery e-mail")
                .arg(email_arg()),
        )
        .subcommand(
            Command::new(CMD_RECOVER)
                .about("Follow a recovery link and set a new password")
                .arg(url_arg("Recovery link from the e-mail"))
                .arg(
                    Arg::new(ARG_NEW_PASSWORD)
                        .long(ARG_NEW_PASSWORD)
                        .help("New password (at least 6 characters)")
                        .env("MEIPORTAL_NEW_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CONFIRM_PASSWORD)
                        .long(ARG_CONFIRM_PASSWORD)
                        .help("Confirmation of the new password (defaults to --new-password)"),
                ),
        )
        .subcommand(
            Command::new(CMD_STATUS)
                .about("Mount the session controller on a URL and print the selected view")
                .arg(url_arg("Portal URL to open"))
                .arg(
                    Arg::new(ARG_TIMEOUT)
                        .long(ARG_TIMEOUT)
                        .help("Seconds to wait for the session and role to resolve")
                        .default_value("15")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
        .subcommand(Command::new(CMD_LOGOUT).about("Sign out and clear the persisted session"))
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("meiportal")
        .about("MEI customer portal auth")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true);

    let command = subcommands(command);
    let command = backend::with_args(command);
    let command = routing::with_args(command);
    logging::with_args(command)
}
