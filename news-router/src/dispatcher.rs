//! Executes one upstream call per dispatch.
//!
//! Nothing here retries. Transport failures and unreadable 200 bodies become
//! errors straight away; non-200 statuses come back as an [`UpstreamResult`]
//! so the route's fallback logic can decide what to do with them.

use crate::articles::UpstreamResult;
use crate::config::PaginationConfig;
use crate::context::RequestContext;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::errors::GatewayError;
use crate::input::Pagination;
use crate::metrics_defs::UPSTREAM_REQUESTS;
use crate::query::{CallSummary, QuerySpec};
use crate::sanitizer::{Sanitized, Sanitizer};
use crate::upstream::{CredentialSource, Upstream, UpstreamRequest};
use chrono::Utc;
use hyper::StatusCode;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use shared::counter;
use std::sync::Arc;

/// Whether sort and pagination defaults are filled in before sending
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Defaults {
    Enforce,
    AsIs,
}

#[derive(Clone, Debug)]
pub struct Dispatched {
    /// The call as it was actually sent
    pub call: CallSummary,
    pub result: UpstreamResult,
}

impl Dispatched {
    /// Splits off a 200 result; any other status becomes an upstream status error.
    pub fn into_success(self) -> Result<(CallSummary, UpstreamResult), GatewayError> {
        let Dispatched { call, result } = self;
        if result.is_success() {
            return Ok((call, result));
        }
        Err(GatewayError::UpstreamStatus {
            call,
            status: result.status,
            body: result.raw_body.unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    upstream: Arc<dyn Upstream>,
    credentials: Arc<dyn CredentialSource>,
    sanitizer: Arc<Sanitizer>,
    pagination: PaginationConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl Dispatcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        credentials: Arc<dyn CredentialSource>,
        sanitizer: Arc<Sanitizer>,
        pagination: PaginationConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            upstream,
            credentials,
            sanitizer,
            pagination,
            sink,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.credential().is_some()
    }

    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        spec: QuerySpec,
        defaults: Defaults,
    ) -> Result<Dispatched, GatewayError> {
        let credential = self
            .credentials
            .credential()
            .ok_or(GatewayError::MissingCredential)?;

        let spec = self.sanitize(ctx, spec);
        let spec = match defaults {
            Defaults::Enforce => self.enforce_defaults(spec),
            Defaults::AsIs => spec,
        };
        let call = CallSummary::from(&spec);
        let request = UpstreamRequest {
            method: spec.method(),
            path: spec.path,
            params: spec.params,
            body: spec.body,
            credential,
        };

        let route = ctx.route().as_str();
        let dispatched_at = Utc::now();
        let raw = match self.upstream.send(request).await {
            Ok(raw) => raw,
            Err(source) => {
                counter!(UPSTREAM_REQUESTS, "route" => route, "outcome" => "transport_error")
                    .increment(1);
                return Err(GatewayError::UpstreamTransport { call, source });
            }
        };

        if raw.status != StatusCode::OK {
            counter!(UPSTREAM_REQUESTS, "route" => route, "outcome" => "status_error").increment(1);
            let result = UpstreamResult::failed(raw.status, &raw.body, dispatched_at);
            return Ok(Dispatched { call, result });
        }

        match UpstreamResult::parse(&raw.body, dispatched_at) {
            Ok(result) => {
                counter!(UPSTREAM_REQUESTS, "route" => route, "outcome" => "ok").increment(1);
                Ok(Dispatched { call, result })
            }
            Err(reason) => {
                counter!(UPSTREAM_REQUESTS, "route" => route, "outcome" => "malformed")
                    .increment(1);
                Err(GatewayError::MalformedResponse {
                    call,
                    reason: reason.to_string(),
                    body: String::from_utf8_lossy(&raw.body).into_owned(),
                })
            }
        }
    }

    fn sanitize(&self, ctx: &RequestContext, spec: QuerySpec) -> QuerySpec {
        let QuerySpec {
            path,
            params,
            body,
            scope,
        } = spec;

        let query: Sanitized<IndexMap<String, String>> =
            self.sanitizer.sanitize(&path, scope, params);
        let mut retained: Vec<String> = query.kept.keys().cloned().collect();
        let mut removed = query.removed;

        let body = body.map(|body| {
            let body: Sanitized<Map<String, Value>> = self.sanitizer.sanitize(&path, scope, body);
            retained.extend(body.kept.keys().cloned());
            removed.extend(body.removed);
            body.kept
        });

        self.sink.emit(DiagnosticEvent::ParamsSanitized {
            route: ctx.route(),
            request_id: ctx.request_id().to_string(),
            endpoint: path.clone(),
            retained,
            removed,
        });

        QuerySpec {
            path,
            params: query.kept,
            body,
            scope,
        }
    }

    /// Newest-first sort plus a valid page and clamped page size, wherever
    /// the call carries its parameters.
    fn enforce_defaults(&self, mut spec: QuerySpec) -> QuerySpec {
        let page = spec.lookup("page").map(Value::String);
        let page_size = spec.lookup("page_size").map(Value::String);
        let pagination = Pagination::resolve(page.as_ref(), page_size.as_ref(), &self.pagination);
        let sort_by = spec
            .lookup("sort_by")
            .filter(|sort| !sort.trim().is_empty())
            .unwrap_or_else(|| self.pagination.default_sort_by.clone());

        match spec.body.as_mut() {
            Some(body) => {
                body.insert("sort_by".to_string(), Value::String(sort_by));
                body.insert("page".to_string(), json!(pagination.page));
                body.insert("page_size".to_string(), json!(pagination.page_size));
            }
            None => {
                spec.params.insert("sort_by".to_string(), sort_by);
                spec.params
                    .insert("page".to_string(), pagination.page.to_string());
                spec.params
                    .insert("page_size".to_string(), pagination.page_size.to_string());
            }
        }
        spec
    }
}
