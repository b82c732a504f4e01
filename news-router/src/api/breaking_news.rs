use crate::api::Handler;
use crate::api::utils::upstream_response;
use crate::context::RequestContext;
use crate::errors::GatewayError;
use crate::fallback::Orchestrator;
use async_trait::async_trait;
use hyper::Response;
use hyper::body::Bytes;

pub struct BreakingNewsHandler {
    orchestrator: Orchestrator,
}

impl BreakingNewsHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Handler for BreakingNewsHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError> {
        let outcome = self
            .orchestrator
            .breaking_news(ctx, &ctx.query_params())
            .await?;
        upstream_response(ctx, &outcome.call, &outcome.payload)
    }
}
