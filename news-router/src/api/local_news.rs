use crate::api::Handler;
use crate::api::utils::{parse_object_body, upstream_response};
use crate::context::RequestContext;
use crate::errors::GatewayError;
use crate::fallback::Orchestrator;
use async_trait::async_trait;
use hyper::Response;
use hyper::body::Bytes;
use serde_json::Map;

pub struct LocalNewsHandler {
    orchestrator: Orchestrator,
}

impl LocalNewsHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Handler for LocalNewsHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError> {
        // An unreadable body is served as if no location had been given
        let body = parse_object_body(ctx.body()).unwrap_or_else(|reason| {
            tracing::warn!(request_id = ctx.request_id(), %reason, "Ignoring local news body");
            Map::new()
        });

        let outcome = self.orchestrator.local_news(ctx, &body).await?;
        upstream_response(ctx, &outcome.call, &outcome.payload)
    }
}
