//! HTTP implementation of [`LinkApi`] against the platform auth API.
//!
//! # Security Note - Logging
//!
//! The bearer token lives in a `SecretString` and the `Authorization`
//! header is marked sensitive, so neither our `Debug` output nor reqwest's
//! request logging will print it.

use std::fmt;
use std::time::Duration;

use reqwest::header;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{LinkError, Result};

use super::{LinkApi, LinkCode, LinkStatusReport, wire};

/// Default path (relative to the API base URL) for issuing link codes.
pub const DEFAULT_CODE_PATH: &str = "auth/link-code";
/// Default path template for listing a user's links.
pub const DEFAULT_STATUS_PATH: &str = "auth/links/{user_id}";

const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// reqwest-backed client for the account-linking endpoints.
pub struct HttpLinkApi {
    client: Client,
    base_url: Url,
    code_path: String,
    status_path: String,
    token: Option<SecretString>,
}

impl fmt::Debug for HttpLinkApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLinkApi")
            .field("base_url", &self.base_url.as_str())
            .field("code_path", &self.code_path)
            .field("status_path", &self.status_path)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpLinkApi {
    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut api = Self::with_timeouts(
            &config.api_url(),
            config.request_timeout(),
            config.connect_timeout(),
        )?
        .with_paths(config.api.code_path.clone(), config.api.status_path.clone());

        if let Some(token) = config.api_token() {
            api.token = Some(token);
        }
        Ok(api)
    }

    /// Create a client for `base_url` with the default timeouts
    /// (10s per request, 5s to connect).
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeouts(base_url, Duration::from_secs(10), Duration::from_secs(5))
    }

    pub fn with_timeouts(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| {
            LinkError::Config(format!("invalid API base URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LinkError::Config(format!(
                "API base URL '{base_url}' cannot have paths appended"
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("linkcode/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            code_path: DEFAULT_CODE_PATH.to_string(),
            status_path: DEFAULT_STATUS_PATH.to_string(),
            token: None,
        })
    }

    /// Override the endpoint paths.
    pub fn with_paths(mut self, code_path: String, status_path: String) -> Self {
        self.code_path = code_path;
        self.status_path = status_path;
        self
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Resolve a path template against the base URL.
    ///
    /// Each segment is percent-encoded on its own, so a user ID containing
    /// `/` or `?` stays a single segment. When the template has no
    /// `{user_id}` placeholder the ID is appended as the last segment.
    fn endpoint(&self, template: &str, user_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                LinkError::Config(format!(
                    "API base URL '{}' cannot have paths appended",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty();

            let mut placed = false;
            for segment in template.split('/').filter(|s| !s.is_empty()) {
                if segment == USER_ID_PLACEHOLDER {
                    segments.push(user_id.unwrap_or_default());
                    placed = true;
                } else {
                    segments.push(segment);
                }
            }
            if let Some(id) = user_id
                && !placed
            {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let Some(token) = &self.token else {
            return Ok(request);
        };
        let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| {
                LinkError::Config("API token contains characters not allowed in a header".to_string())
            })?;
        value.set_sensitive(true);
        Ok(request.header(header::AUTHORIZATION, value))
    }

    /// Read a JSON body, turning non-2xx responses into `LinkError::Api`.
    async fn json_body(response: Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = server_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(LinkError::Api { status, message });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| LinkError::Decode(format!("response body is not JSON: {e}")))
    }
}

/// Pull a human-readable message out of an error body, if there is one.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

impl LinkApi for HttpLinkApi {
    async fn generate_link_code(&self) -> Result<LinkCode> {
        let url = self.endpoint(&self.code_path, None)?;
        debug!(%url, "requesting link code");

        // Every failure is reported the same way; the server's error codes
        // carry nothing the user can act on beyond "try again".
        let request = self.authorize(self.client.post(url))?;
        let response = request
            .send()
            .await
            .map_err(|e| LinkError::CodeGeneration(format!("request failed: {e}")))?;

        let body = Self::json_body(response).await.map_err(|e| match e {
            LinkError::Api { status, .. } => LinkError::CodeGeneration(format!(
                "server responded with HTTP {}",
                status.as_u16()
            )),
            other => LinkError::CodeGeneration(other.to_string()),
        })?;

        wire::decode_link_code(body).map_err(|e| LinkError::CodeGeneration(e.to_string()))
    }

    async fn check_link_status(&self, user_id: &str) -> Result<LinkStatusReport> {
        let url = self.endpoint(&self.status_path, Some(user_id))?;
        debug!(%url, "checking link status");

        let request = self.authorize(self.client.get(url))?;
        let response = request.send().await?;
        let body = Self::json_body(response).await?;
        wire::decode_link_status(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_with_path() {
        let api = HttpLinkApi::new("https://play.example.com/api").unwrap();
        let url = api.endpoint(DEFAULT_CODE_PATH, None).unwrap();
        assert_eq!(url.as_str(), "https://play.example.com/api/auth/link-code");

        let api = HttpLinkApi::new("https://play.example.com/api/").unwrap();
        let url = api.endpoint("/auth/link-code", None).unwrap();
        assert_eq!(url.as_str(), "https://play.example.com/api/auth/link-code");
    }

    #[test]
    fn test_endpoint_substitutes_and_encodes_user_id() {
        let api = HttpLinkApi::new("https://play.example.com/api").unwrap();
        let url = api.endpoint(DEFAULT_STATUS_PATH, Some("user 42/x")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://play.example.com/api/auth/links/user%2042%2Fx"
        );
    }

    #[test]
    fn test_endpoint_appends_user_id_without_placeholder() {
        let api = HttpLinkApi::new("https://play.example.com")
            .unwrap()
            .with_paths("codes".to_string(), "users/links".to_string());
        let url = api.endpoint(&api.status_path, Some("42")).unwrap();
        assert_eq!(url.as_str(), "https://play.example.com/users/links/42");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpLinkApi::new("not a url").is_err());
        assert!(HttpLinkApi::new("mailto:admin@example.com").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let api = HttpLinkApi::new("https://play.example.com")
            .unwrap()
            .with_token("super-secret-token");
        let debug = format!("{api:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(
            server_message(r#"{"message":"Too many requests"}"#).as_deref(),
            Some("Too many requests")
        );
        assert_eq!(server_message(r#"{"error":" nope "}"#).as_deref(), Some("nope"));
        assert_eq!(server_message("<html>oops</html>"), None);
        assert_eq!(server_message(r#"{"message":""}"#), None);
    }
}
