//! Generic passthrough to any upstream endpoint below the proxy prefix.
//!
//! `/news/search` and `/news/api/search` both reach `/api/search`. Query
//! string and body are limited to the passthrough allowlist, the gateway's
//! credential is attached, and article payloads are filtered by whatever
//! country/language the caller asked the upstream for.

use crate::api::Handler;
use crate::api::utils::{parse_object_body, upstream_response};
use crate::context::RequestContext;
use crate::dispatcher::{Defaults, Dispatcher};
use crate::errors::GatewayError;
use crate::filter::{FilterCriteria, ResponseFilter};
use crate::query::QuerySpec;
use crate::router::Router;
use crate::sanitizer::ParamScope;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Method, Response};
use serde_json::Value;

/// Maps a caller-facing suffix onto the upstream's `/api` namespace.
pub fn normalize_api_path(suffix: &str) -> String {
    let trimmed = suffix.trim_start_matches('/');
    let rest = match trimmed.strip_prefix("api/") {
        Some(rest) => rest,
        None if trimmed == "api" => "",
        None => trimmed,
    };

    if rest.is_empty() {
        "/api".to_string()
    } else {
        format!("/api/{rest}")
    }
}

pub struct PassthroughHandler {
    dispatcher: Dispatcher,
    router: Router,
    filter: ResponseFilter,
    search_endpoint: String,
}

impl PassthroughHandler {
    pub fn new(
        dispatcher: Dispatcher,
        router: Router,
        filter: ResponseFilter,
        search_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            router,
            filter,
            search_endpoint: search_endpoint.into(),
        }
    }

    fn build_spec(&self, ctx: &RequestContext) -> Result<QuerySpec, GatewayError> {
        let suffix = self
            .router
            .passthrough_suffix(ctx.path())
            .ok_or_else(|| GatewayError::NotFound(format!("No upstream path in {}", ctx.path())))?;

        let body = match *ctx.method() {
            Method::POST => Some(parse_object_body(ctx.body()).map_err(GatewayError::ClientInput)?),
            _ => None,
        };

        let spec = QuerySpec {
            path: normalize_api_path(suffix),
            params: ctx.query_params(),
            body,
            scope: ParamScope::Passthrough,
        };

        let is_search = spec.path.trim_end_matches('/') == self.search_endpoint;
        let has_query = spec
            .lookup("q")
            .is_some_and(|q| !q.trim().is_empty());
        if is_search && !has_query {
            return Err(GatewayError::ClientInput(
                "The `q` parameter is required for /search.".to_string(),
            ));
        }

        Ok(spec)
    }
}

#[async_trait]
impl Handler for PassthroughHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError> {
        let spec = self.build_spec(ctx)?;
        let criteria = FilterCriteria::from_passthrough(&spec.params, spec.body.as_ref());

        let (call, mut result) = self
            .dispatcher
            .dispatch(ctx, spec, Defaults::AsIs)
            .await?
            .into_success()?;

        let articles = std::mem::take(&mut result.articles);
        result.articles = self
            .filter
            .apply(ctx, &criteria, articles, result.dispatched_at);

        let payload = Value::Object(result.into_payload());
        upstream_response(ctx, &call, &payload)
    }
}
