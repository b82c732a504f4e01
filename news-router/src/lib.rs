pub mod api;
pub mod articles;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dispatcher;
pub mod errors;
pub mod fallback;
pub mod filter;
pub mod input;
pub mod metrics_defs;
pub mod query;
pub mod query_builder;
pub mod router;
pub mod sanitizer;
pub mod upstream;

#[cfg(test)]
mod testutils;

use crate::api::Handler;
use crate::api::breaking_news::BreakingNewsHandler;
use crate::api::health::HealthHandler;
use crate::api::local_news::LocalNewsHandler;
use crate::api::passthrough::PassthroughHandler;
use crate::api::utils::error_response;
use crate::context::{RequestContext, RouteName};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::dispatcher::Dispatcher;
use crate::errors::{ErrorMapper, GatewayError};
use crate::fallback::Orchestrator;
use crate::filter::ResponseFilter;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::query_builder::{QueryBuilder, StateNames};
use crate::router::Router;
use crate::sanitizer::Sanitizer;
use crate::upstream::{CredentialSource, EnvCredential, HttpUpstream, Upstream};
use errors::NewsRouterError;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::service::Service;
use hyper::{Request, Response};
use metrics::Gauge;
use shared::admin_service::AdminService;
use shared::http::{full_body, run_http_service};
use shared::{gauge, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub async fn run(config: config::Config) -> Result<(), NewsRouterError> {
    config.validate()?;

    let gateway = Gateway::from_config(config.clone())?;
    if !gateway.is_ready() {
        tracing::warn!(
            credential_env = %config.upstream.credential_env,
            "News API credential is not set; requests will fail until it is"
        );
    }

    let readiness = gateway.clone();
    let admin_service = AdminService::<_, Infallible>::new(move || readiness.is_ready());

    let gateway_task = run_http_service::<_, _, NewsRouterError>(
        &config.listener.host,
        config.listener.port,
        gateway,
    );
    let admin_task = run_http_service::<_, _, NewsRouterError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

/// The inbound HTTP surface: routing, body limits, panic isolation and
/// error envelopes around the route handlers.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    router: Router,
    dispatcher: Dispatcher,
    health: HealthHandler,
    local_news: LocalNewsHandler,
    breaking_news: BreakingNewsHandler,
    passthrough: PassthroughHandler,
    errors: ErrorMapper,
    request_id_headers: Vec<String>,
    max_request_body_bytes: usize,
    not_found_message: String,
}

impl Gateway {
    pub fn new(
        config: config::Config,
        upstream: Arc<dyn Upstream>,
        credentials: Arc<dyn CredentialSource>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let router = Router::new(&config.routes);
        let dispatcher = Dispatcher::new(
            upstream,
            credentials,
            Arc::new(Sanitizer::new(&config.params)),
            config.pagination.clone(),
            sink.clone(),
        );
        let builder = Arc::new(QueryBuilder::new(
            StateNames::us(),
            config.upstream.endpoints.clone(),
            config.pagination.clone(),
            config.local_radius_km,
        ));
        let orchestrator = Orchestrator::new(
            dispatcher.clone(),
            builder.clone(),
            sink.clone(),
            config.pagination.clone(),
            config.local_countries.clone(),
        );

        let not_found_message = format!(
            "Not found. Use {}/* or {}.",
            config.routes.proxy_prefix.trim_end_matches('/'),
            config.routes.local_news
        );

        let inner = GatewayInner {
            health: HealthHandler::new(dispatcher.clone(), builder),
            local_news: LocalNewsHandler::new(orchestrator.clone()),
            breaking_news: BreakingNewsHandler::new(orchestrator),
            passthrough: PassthroughHandler::new(
                dispatcher.clone(),
                router.clone(),
                ResponseFilter::new(sink.clone()),
                config.upstream.endpoints.search.clone(),
            ),
            router,
            dispatcher,
            errors: ErrorMapper::new(config.max_error_body_chars, sink),
            request_id_headers: config.request_id_headers,
            max_request_body_bytes: config.max_request_body_bytes,
            not_found_message,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Production wiring: HTTPS upstream, credential from the environment,
    /// diagnostics to `tracing`.
    pub fn from_config(config: config::Config) -> Result<Self, NewsRouterError> {
        let upstream = HttpUpstream::new(&config.upstream)?;
        let credentials = EnvCredential::new(config.upstream.credential_env.clone());
        Ok(Self::new(
            config,
            Arc::new(upstream),
            Arc::new(credentials),
            Arc::new(TracingSink),
        ))
    }

    /// Ready once a credential is available.
    pub fn is_ready(&self) -> bool {
        self.inner.dispatcher.has_credential()
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<Bytes>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let (parts, body) = request.into_parts();
        let route = self.inner.router.resolve(&parts.method, parts.uri.path());

        let _inflight = InflightGuard::enter();

        let response = match Limited::new(body, self.inner.max_request_body_bytes)
            .collect()
            .await
        {
            Ok(collected) => {
                let ctx = RequestContext::new(
                    &parts,
                    collected.to_bytes(),
                    route,
                    &self.inner.request_id_headers,
                );
                self.respond(ctx).await
            }
            Err(e) => {
                let ctx = RequestContext::new(
                    &parts,
                    Bytes::new(),
                    route,
                    &self.inner.request_id_headers,
                );
                let message = if e.is::<LengthLimitError>() {
                    format!(
                        "Request body exceeds {} bytes.",
                        self.inner.max_request_body_bytes
                    )
                } else {
                    format!("Request body could not be read: {e}")
                };
                error_response(&ctx, &self.inner.errors, &GatewayError::ClientInput(message))
            }
        };

        histogram!(
            REQUEST_DURATION,
            "route" => route.as_str(),
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    /// Runs the matched handler on its own task so a panic becomes a 500.
    async fn respond(&self, ctx: RequestContext) -> Response<Bytes> {
        let gateway = self.clone();
        let task_ctx = ctx.clone();
        let result = match tokio::spawn(async move { gateway.route(&task_ctx).await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    request_id = ctx.request_id(),
                    route = %ctx.route(),
                    error = %e,
                    "Handler task failed"
                );
                Err(GatewayError::Internal(e.to_string()))
            }
        };

        result.unwrap_or_else(|error| error_response(&ctx, &self.inner.errors, &error))
    }

    async fn route(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError> {
        let inner = &self.inner;
        match ctx.route() {
            RouteName::Health => inner.health.handle(ctx).await,
            RouteName::LocalNews => inner.local_news.handle(ctx).await,
            RouteName::BreakingNews => inner.breaking_news.handle(ctx).await,
            RouteName::Passthrough => inner.passthrough.handle(ctx).await,
            RouteName::NotFound => Err(GatewayError::NotFound(inner.not_found_message.clone())),
        }
    }
}

/// One slot of the in-flight gauge. Released on drop, including when the
/// request future is cancelled.
struct InflightGuard(Gauge);

impl InflightGuard {
    fn enter() -> Self {
        let gauge = gauge!(REQUESTS_INFLIGHT);
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

impl<B> Service<Request<B>> for Gateway
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.handle(req).await.map(full_body)) })
    }
}
