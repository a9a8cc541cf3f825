//! # meiportal (MEI Customer Portal Auth Core)
//!
//! `meiportal` decides what a customer of the portal is allowed to see. It reads
//! the auth session, follows password-recovery links, checks the admin
//! authorization list, and selects exactly one top-level view.
//!
//! ## Routing
//!
//! The current URL is classified once per navigation into `login`, `recovery`,
//! `admin` or `app`. Recovery links come in three encodings (`?type=recovery`,
//! `?code=...` from the `PKCE` flow, and the legacy `#access_token=...` fragment);
//! any one of them is enough. Recovery always wins, even before the session has
//! loaded, so a user following an e-mail link never sees a login screen first.
//!
//! ## Session & Role Controller
//!
//! A pure state machine (`portal::machine`) owns "am I signed in, am I an admin".
//! An async driver (`portal::controller`) runs store calls on tokio and feeds the
//! results back. Admin status is **fail-closed**: any lookup error resolves to
//! non-admin. Results that arrive after a newer session replaced the one they
//! were issued for are discarded.
//!
//! ## Backend
//!
//! The `gotrue` module implements the session store against the Supabase Auth
//! (`GoTrue`) REST API and a `PostgREST` table holding the admin user ids.
//! Tokens are kept in `SecretString` and never logged.

pub mod cli;
pub mod gotrue;
pub mod portal;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
