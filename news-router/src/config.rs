use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Upstream timeout must be greater than 0")]
    InvalidTimeout,

    #[error("Credential environment variable name is empty")]
    EmptyCredentialEnv,

    #[error("Invalid credential header name: {0}")]
    InvalidCredentialHeader(String),

    #[error("Path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Invalid page size bounds: min={min}, default={default}, max={max}")]
    InvalidPageSize { min: u32, default: u32, max: u32 },

    #[error("Local search radius must be a positive number of kilometers")]
    InvalidRadius,
}

/// News router configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for liveness/readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub params: ParamsConfig,
    /// Inbound headers consulted, in order, for a caller-supplied request id
    #[serde(default = "default_request_id_headers")]
    pub request_id_headers: Vec<String>,
    /// Upstream error bodies are cut to this many characters before reaching a caller
    #[serde(default = "default_max_error_body_chars")]
    pub max_error_body_chars: usize,
    #[serde(default = "default_max_request_body_bytes")]
    pub max_request_body_bytes: usize,
    /// Radius used by coordinate lookups when the caller sends none (or an invalid one)
    #[serde(default = "default_local_radius_km")]
    pub local_radius_km: f64,
    /// Countries local-news articles must belong to
    #[serde(default = "default_local_countries")]
    pub local_countries: Vec<String>,
}

impl Config {
    /// Validates the news router configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.routes.validate()?;
        self.pagination.validate()?;

        if !(self.local_radius_km.is_finite() && self.local_radius_km > 0.0) {
            return Err(ValidationError::InvalidRadius);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// The single upstream news API
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; endpoint paths are joined onto it
    pub base_url: Url,
    /// Environment variable holding the API credential
    pub credential_env: String,
    /// Header the credential is sent in
    pub credential_header: String,
    pub timeout_secs: u64,
    pub endpoints: EndpointsConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://v3-api.newscatcherapi.com")
                .expect("static upstream URL is valid"),
            credential_env: "NEWS_API_TOKEN".to_string(),
            credential_header: "x-api-token".to_string(),
            timeout_secs: 10,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.credential_env.trim().is_empty() {
            return Err(ValidationError::EmptyCredentialEnv);
        }
        if http::HeaderName::from_bytes(self.credential_header.as_bytes()).is_err() {
            return Err(ValidationError::InvalidCredentialHeader(
                self.credential_header.clone(),
            ));
        }
        self.endpoints.validate()
    }
}

/// Upstream endpoint paths
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub search: String,
    pub breaking_news: String,
    pub latest_headlines: String,
    pub search_by_location: String,
    pub subscription: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            search: "/api/search".to_string(),
            breaking_news: "/api/breaking_news".to_string(),
            latest_headlines: "/api/latest_headlines".to_string(),
            search_by_location: "/api/search_by_location".to_string(),
            subscription: "/api/subscription".to_string(),
        }
    }
}

impl EndpointsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for path in [
            &self.search,
            &self.breaking_news,
            &self.latest_headlines,
            &self.search_by_location,
            &self.subscription,
        ] {
            validate_path(path)?;
        }
        Ok(())
    }
}

/// Inbound paths served by the gateway
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutesConfig {
    pub health: String,
    pub local_news: String,
    pub breaking_news: String,
    /// Everything below this prefix is passed through to the upstream
    pub proxy_prefix: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            health: "/news/__health".to_string(),
            local_news: "/local/local-news".to_string(),
            breaking_news: "/news/breaking".to_string(),
            proxy_prefix: "/news".to_string(),
        }
    }
}

impl RoutesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for path in [
            &self.health,
            &self.local_news,
            &self.breaking_news,
            &self.proxy_prefix,
        ] {
            validate_path(path)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub min_page_size: u32,
    pub max_page_size: u32,
    /// Page size of the latest-headlines fallback query
    pub fallback_page_size: u32,
    /// `sort_by` value meaning "published date, newest first"
    pub default_sort_by: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            min_page_size: 1,
            max_page_size: 100,
            fallback_page_size: 10,
            default_sort_by: "date".to_string(),
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let (min, default, max) = (
            self.min_page_size,
            self.default_page_size,
            self.max_page_size,
        );

        let in_range = |size: u32| min <= size && size <= max;
        if min == 0 || !in_range(default) || !in_range(self.fallback_page_size) {
            return Err(ValidationError::InvalidPageSize { min, default, max });
        }
        Ok(())
    }
}

/// Parameter allow/deny lists
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParamsConfig {
    /// Keys removed from every upstream call
    pub denied: BTreeSet<String>,
    /// Upstream endpoint path to the denied keys it may still receive
    pub overrides: BTreeMap<String, BTreeSet<String>>,
    /// The only keys the generic passthrough forwards
    pub passthrough_allowlist: BTreeSet<String>,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        let set = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>();

        Self {
            denied: set(&["location", "lat", "lon", "geo"]),
            overrides: BTreeMap::from([(
                EndpointsConfig::default().search_by_location,
                set(&["lat", "lon"]),
            )]),
            passthrough_allowlist: set(&[
                "q",
                "search_in",
                "lang",
                "not_lang",
                "countries",
                "not_countries",
                "sources",
                "not_sources",
                "predefined_sources",
                "from_",
                "to_",
                "published_date_precision",
                "by_parse_date",
                "sort_by",
                "ranked_only",
                "from_rank",
                "to_rank",
                "is_headline",
                "is_opinion",
                "is_paid_content",
                "word_count_min",
                "word_count_max",
                "page",
                "page_size",
                "clustering_enabled",
                "clustering_variable",
                "clustering_threshold",
                "include_nlp_data",
                "has_nlp",
                "theme",
                "not_theme",
                "exclude_duplicates",
                "when",
                "timezone",
                "links",
                "ids",
            ]),
        }
    }
}

fn validate_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') {
        return Err(ValidationError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn default_request_id_headers() -> Vec<String> {
    vec!["x-request-id".to_string(), "cf-ray".to_string()]
}

fn default_max_error_body_chars() -> usize {
    512
}

fn default_max_request_body_bytes() -> usize {
    64 * 1024
}

fn default_local_radius_km() -> f64 {
    50.0
}

fn default_local_countries() -> Vec<String> {
    vec!["US".to_string()]
}
