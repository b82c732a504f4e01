use crate::config::UpstreamConfig;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::{ACCEPT, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Source of the upstream API credential, consulted on every request.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<String>;
}

/// Reads the credential from an environment variable.
#[derive(Clone, Debug)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

/// A fixed credential (or the absence of one).
#[derive(Clone, Debug)]
pub struct StaticCredential(pub Option<String>);

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A fully sanitized call, ready to go on the wire
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub params: IndexMap<String, String>,
    pub body: Option<Map<String, Value>>,
    pub credential: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Performs exactly one HTTP exchange with the news API.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, TransportError>;
}

#[derive(Clone, Debug)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: Url,
    credential_header: HeaderName,
    timeout_secs: u64,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let credential_header = HeaderName::from_bytes(config.credential_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("x-api-token"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credential_header,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base carries.
    fn url_for(&self, path: &str, params: &IndexMap<String, String>) -> Url {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params.iter());
        }
        url
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path, &request.params);
        let credential = HeaderValue::from_str(&request.credential)
            .map_err(|e| TransportError::Request(format!("invalid credential header: {e}")))?;

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .header(self.credential_header.clone(), credential)
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, url = %url, "News API request");

        let response = timeout(Duration::from_secs(self.timeout_secs), builder.send())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout_secs))?
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!(method = %request.method, url = %url, %status, "News API response");

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}
