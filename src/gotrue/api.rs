//! HTTP plumbing shared by every GoTrue and PostgREST call: one client with a
//! fixed timeout, the `apikey` header, bearer selection and consistent error
//! mapping. Error bodies are reduced to the backend's own message, trimmed and
//! truncated before they reach the user.

use super::error::GoTrueError;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

/// Request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// # Errors
    /// [`GoTrueError::Config`] if the base URL cannot carry paths or the HTTP
    /// client cannot be built.
    pub fn new(
        user_agent: &str,
        base_url: Url,
        anon_key: SecretString,
    ) -> Result<Self, GoTrueError> {
        if base_url.cannot_be_a_base() {
            return Err(GoTrueError::Config(format!(
                "auth URL cannot be used as a base: {base_url}"
            )));
        }
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| GoTrueError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base has,
    /// and appends `query`.
    ///
    /// # Errors
    /// [`GoTrueError::Config`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, GoTrueError> {
        let joined = build_url_with_base(self.base_url.as_str(), path);
        let mut url = Url::parse(&joined)
            .map_err(|err| GoTrueError::Config(format!("invalid endpoint {joined}: {err}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sends a JSON request. `bearer` falls back to the anon key. A successful
    /// response with an empty body yields `Value::Null`.
    ///
    /// # Errors
    /// Transport failures, non-2xx statuses (with the sanitized backend
    /// message) and undecodable bodies.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        bearer: Option<&SecretString>,
        body: Option<&Value>,
    ) -> Result<Value, GoTrueError> {
        let url = self.endpoint(path, query)?;
        debug!("auth request: {} {}", method, url.path());

        let bearer = bearer.unwrap_or(&self.anon_key);
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json")
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GoTrueError::Http {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|err| GoTrueError::Parse(format!("Failed to decode response: {err}")))
    }
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Picks the human-readable part of a GoTrue or PostgREST error body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    sanitize_body(from_json.as_deref().unwrap_or(body))
}

/// Trims and truncates error bodies for user-facing messages.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
