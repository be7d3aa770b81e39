//! HTTP client shared by every domain client.

use super::url::{compose_url, trim_bom};
use crate::config::ProviderConfig;
use crate::error::{AzdoError, AzdoResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Response header carrying the next-page token of a list call.
pub const CONTINUATION_TOKEN_HEADER: &str = "x-ms-continuationtoken";

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";

/// Decoded response body plus the headers callers care about.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub body: T,
    pub status: StatusCode,
    pub continuation_token: Option<String>,
}

/// Immutable, cheaply cloneable client bound to one base URL.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    authorization: Arc<Secret<String>>,
    user_agent: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// `Basic base64(":" + pat)`.
pub fn basic_authorization(personal_access_token: &Secret<String>) -> Secret<String> {
    let encoded = STANDARD.encode(format!(":{}", personal_access_token.expose_secret()));
    Secret::new(format!("Basic {encoded}"))
}

impl RestClient {
    pub fn new(base_url: &str, authorization: Secret<String>) -> AzdoResult<Self> {
        Self::with_http(reqwest::Client::new(), base_url, authorization)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        authorization: Secret<String>,
    ) -> AzdoResult<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))?;
        Ok(Self {
            http,
            base,
            authorization: Arc::new(authorization),
            user_agent: format!("azdo-provider/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Client for the organization URL.
    pub fn from_config(config: &ProviderConfig) -> AzdoResult<Self> {
        Self::new(
            config.organization_url(),
            basic_authorization(&config.personal_access_token),
        )
    }

    /// Same credentials, pointed at another host (the identity host, for instance).
    pub fn rebase(&self, base_url: &str) -> AzdoResult<Self> {
        Ok(Self {
            http: self.http.clone(),
            base: Url::parse(base_url.trim_end_matches('/'))?,
            authorization: Arc::clone(&self.authorization),
            user_agent: self.user_agent.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Start a request. Segments are given in path order and encoded individually.
    pub fn request<I, S>(&self, method: Method, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequestBuilder {
            client: self,
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            api_version: None,
            body: None,
            content_type: JSON,
            redact_response: false,
        }
    }

    pub fn get<I, S>(&self, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Method::GET, segments)
    }

    pub fn post<I, S>(&self, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Method::POST, segments)
    }

    pub fn put<I, S>(&self, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Method::PUT, segments)
    }

    pub fn patch<I, S>(&self, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Method::PATCH, segments)
    }

    pub fn delete<I, S>(&self, segments: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Method::DELETE, segments)
    }

    fn authorization_header(&self) -> AzdoResult<HeaderValue> {
        let mut value = HeaderValue::from_str(self.authorization.expose_secret()).map_err(|_| {
            AzdoError::Config("personal access token contains invalid header characters".into())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// One request in flight. Built with [`RestClient::request`] and consumed by `send`.
#[must_use]
pub struct RequestBuilder<'a> {
    client: &'a RestClient,
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    api_version: Option<String>,
    body: Option<Vec<u8>>,
    content_type: &'static str,
    redact_response: bool,
}

impl RequestBuilder<'_> {
    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Adds the pair only when `value` is `Some`.
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> AzdoResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Switch the content type to `application/json-patch+json`.
    pub fn json_patch(mut self) -> Self {
        self.content_type = JSON_PATCH;
        self
    }

    /// Keep the response body out of the debug log.
    pub fn redact_response(mut self) -> Self {
        self.redact_response = true;
        self
    }

    pub fn url(&self) -> AzdoResult<Url> {
        compose_url(
            &self.client.base,
            &self.segments,
            &self.query,
            self.api_version.as_deref(),
        )
    }

    /// Execute and decode the body into `T`.
    pub async fn send<T: DeserializeOwned>(self) -> AzdoResult<T> {
        Ok(self.send_with_headers::<T>().await?.body)
    }

    /// Execute and decode, keeping the continuation token and status.
    pub async fn send_with_headers<T: DeserializeOwned>(self) -> AzdoResult<ApiResponse<T>> {
        let url = self.url()?;
        tracing::info!(method = %self.method, url = %url, "Azure DevOps request");

        let mut request = self
            .client
            .http
            .request(self.method.clone(), url.clone())
            .header(ACCEPT, JSON)
            .header(AUTHORIZATION, self.client.authorization_header()?)
            .header(USER_AGENT, self.client.user_agent.as_str());

        if let Some(body) = self.body {
            // Request bodies can carry credentials, so only their size is logged.
            tracing::debug!(bytes = body.len(), content_type = self.content_type, "Request body");
            request = request.header(CONTENT_TYPE, self.content_type).body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(method = %self.method, url = %url, error = %e, "Transport error");
            AzdoError::Transport(e.without_url())
        })?;

        let status = response.status();
        let continuation_token = header_string(response.headers(), CONTINUATION_TOKEN_HEADER);
        let retry_after = header_string(response.headers(), RETRY_AFTER.as_str())
            .and_then(|v| v.parse::<u64>().ok());
        let bytes = response.bytes().await?;
        let body = trim_bom(&bytes);

        if self.redact_response {
            tracing::debug!(status = status.as_u16(), bytes = body.len(), "Response body redacted");
        } else {
            tracing::debug!(
                status = status.as_u16(),
                body = %String::from_utf8_lossy(body),
                "Response body"
            );
        }

        if !status.is_success() {
            let err = AzdoError::from_response(status, retry_after, body);
            tracing::warn!(
                method = %self.method,
                url = %url,
                status = status.as_u16(),
                error = %err,
                "Azure DevOps returned an error"
            );
            return Err(err);
        }

        let body = decode_body::<T>(body)?;
        Ok(ApiResponse {
            body,
            status,
            continuation_token,
        })
    }
}

fn header_string(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// An empty body decodes like `null`, so `Option<T>` and [`super::NoContent`] accept it.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> AzdoResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::NoContent;

    #[test]
    fn test_basic_authorization_encodes_empty_user() {
        let header = basic_authorization(&Secret::new("pat".to_string()));
        assert_eq!(header.expose_secret(), "Basic OnBhdA==");
    }

    #[test]
    fn test_debug_hides_authorization() {
        let client = RestClient::new(
            "https://dev.azure.com/contoso",
            basic_authorization(&Secret::new("hunter2".to_string())),
        )
        .unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("Basic"));
        assert!(printed.contains("dev.azure.com"));
    }

    #[test]
    fn test_builder_composes_url() {
        let client = RestClient::new("https://dev.azure.com/contoso/", Secret::new("x".into())).unwrap();
        let url = client
            .get(["_apis", "projects", "demo"])
            .query("includeCapabilities", true)
            .api_version("7.0")
            .url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/contoso/_apis/projects/demo?includeCapabilities=true&api-version=7.0"
        );
    }

    #[test]
    fn test_decode_empty_body() {
        let none: Option<serde_json::Value> = decode_body(b"").unwrap();
        assert!(none.is_none());
        let _: NoContent = decode_body(b"  ").unwrap();
        let _: NoContent = decode_body(br#"{"anything": 1}"#).unwrap();
    }

    #[test]
    fn test_decode_body_rejects_wrong_shape() {
        let result: AzdoResult<Vec<u32>> = decode_body(br#"{"a": 1}"#);
        assert!(matches!(result, Err(AzdoError::Decode(_))));
    }
}
