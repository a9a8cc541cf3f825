//! Route classification and recovery credential extraction.
//!
//! A URL is classified once per navigation event. Recovery links are detected
//! in any of their three encodings and always win over the other routes; the
//! admin area is a configurable path or hash-path prefix.

use secrecy::SecretString;
use std::{fmt, str::FromStr};
use url::Url;

pub const DEFAULT_ADMIN_PREFIX: &str = "/admin";
pub const LOGIN_PATH: &str = "/login";

const RECOVERY_TYPE: &str = "recovery";
const PARAM_TYPE: &str = "type";
const PARAM_CODE: &str = "code";
const PARAM_ACCESS_TOKEN: &str = "access_token";
const PARAM_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Recovery,
    Admin,
    App,
}

impl Route {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Recovery => "recovery",
            Self::Admin => "admin",
            Self::App => "app",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the admin marker lives: the URL path (`/admin/...`) or the hash
/// sub-path (`#/admin/...`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminRouteScheme {
    #[default]
    Path,
    Hash,
}

impl FromStr for AdminRouteScheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "hash" => Ok(Self::Hash),
            other => Err(format!("invalid routing scheme: {other} (expected path or hash)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteClassifier {
    scheme: AdminRouteScheme,
    admin_prefix: String,
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new(AdminRouteScheme::Path, DEFAULT_ADMIN_PREFIX)
    }
}

impl RouteClassifier {
    /// The prefix is normalized to a leading `/` without a trailing one; an
    /// empty prefix falls back to `/admin`.
    #[must_use]
    pub fn new(scheme: AdminRouteScheme, admin_prefix: &str) -> Self {
        let trimmed = admin_prefix.trim().trim_matches('/');
        let admin_prefix = if trimmed.is_empty() {
            DEFAULT_ADMIN_PREFIX.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self {
            scheme,
            admin_prefix,
        }
    }

    #[must_use]
    pub const fn scheme(&self) -> AdminRouteScheme {
        self.scheme
    }

    #[must_use]
    pub fn admin_prefix(&self) -> &str {
        &self.admin_prefix
    }

    /// First match wins: recovery event, recovery link, admin prefix, login
    /// path, then the main app.
    #[must_use]
    pub fn classify(&self, url: &Url, recovery_event: bool) -> Route {
        if recovery_event || is_recovery_link(url) {
            Route::Recovery
        } else if self.is_admin(url) {
            Route::Admin
        } else if routed_path(url, self.scheme) == LOGIN_PATH {
            Route::Login
        } else {
            Route::App
        }
    }

    fn is_admin(&self, url: &Url) -> bool {
        let path = routed_path(url, self.scheme);
        path == self.admin_prefix
            || path
                .strip_prefix(self.admin_prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// A URL together with the route it was classified as at navigation time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub url: Url,
    pub route: Route,
}

impl Navigation {
    #[must_use]
    pub fn resolve(classifier: &RouteClassifier, url: Url, recovery_event: bool) -> Self {
        let route = classifier.classify(&url, recovery_event);
        Self { url, route }
    }
}

/// Any of `#type=recovery`, `#access_token=...`, `?type=recovery` or
/// `?code=...` marks a recovery link.
#[must_use]
pub fn is_recovery_link(url: &Url) -> bool {
    let by_fragment = fragment_params(url).iter().any(|(key, value)| {
        (key == PARAM_TYPE && value == RECOVERY_TYPE) || key == PARAM_ACCESS_TOKEN
    });
    let by_query_type = query_param(url, PARAM_TYPE).is_some_and(|value| value == RECOVERY_TYPE);
    let by_code = query_param(url, PARAM_CODE).is_some_and(|value| !value.is_empty());

    by_fragment || by_query_type || by_code
}

/// Credential material carried by a recovery link. Consumed once.
#[derive(Clone)]
pub enum RecoveryCredential {
    ExchangeCode(SecretString),
    TokenPair {
        access_token: SecretString,
        refresh_token: SecretString,
    },
}

impl RecoveryCredential {
    /// Prefers the exchange code; falls back to a legacy fragment token pair
    /// when both halves are present.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        Self::candidates(url).into_iter().next()
    }

    /// Every credential carried by `url`, in the order they should be tried:
    /// the exchange code first, then the fragment token pair.
    #[must_use]
    pub fn candidates(url: &Url) -> Vec<Self> {
        let mut found = Vec::with_capacity(2);
        if let Some(code) = query_param(url, PARAM_CODE).filter(|code| !code.is_empty()) {
            found.push(Self::ExchangeCode(SecretString::from(code)));
        }

        let params = fragment_params(url);
        let find = |name: &str| {
            params
                .iter()
                .find(|(key, value)| key == name && !value.is_empty())
                .map(|(_, value)| SecretString::from(value.clone()))
        };
        if let (Some(access_token), Some(refresh_token)) =
            (find(PARAM_ACCESS_TOKEN), find(PARAM_REFRESH_TOKEN))
        {
            found.push(Self::TokenPair {
                access_token,
                refresh_token,
            });
        }
        found
    }

    /// `url` with this credential's material removed.
    #[must_use]
    pub fn strip_from(&self, url: &Url) -> Url {
        let mut stripped = url.clone();
        match self {
            Self::ExchangeCode(_) => {
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(key, _)| key != PARAM_CODE && key != PARAM_TYPE)
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();
                if kept.is_empty() {
                    stripped.set_query(None);
                } else {
                    stripped.query_pairs_mut().clear().extend_pairs(kept);
                }
            }
            Self::TokenPair { .. } => stripped.set_fragment(None),
        }
        stripped
    }
}

impl fmt::Debug for RecoveryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExchangeCode(_) => f.write_str("ExchangeCode(***)"),
            Self::TokenPair { .. } => f.write_str("TokenPair(***)"),
        }
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Key/value pairs of the fragment. With hash routing the pairs follow a `?`
/// (`#/reset?type=recovery`); otherwise the whole fragment is the pair list.
fn fragment_params(url: &Url) -> Vec<(String, String)> {
    let Some(fragment) = url.fragment() else {
        return Vec::new();
    };
    let pairs = fragment
        .split_once('?')
        .map_or(fragment, |(_, query)| query);
    url::form_urlencoded::parse(pairs.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn routed_path(url: &Url, scheme: AdminRouteScheme) -> String {
    let raw = match scheme {
        AdminRouteScheme::Path => url.path(),
        AdminRouteScheme::Hash => url
            .fragment()
            .map_or("", |fragment| {
                fragment.split_once('?').map_or(fragment, |(path, _)| path)
            }),
    };
    let trimmed = raw.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
