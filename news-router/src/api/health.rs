use crate::api::Handler;
use crate::api::utils::upstream_response;
use crate::context::RequestContext;
use crate::dispatcher::{Defaults, Dispatcher};
use crate::errors::GatewayError;
use crate::query_builder::QueryBuilder;
use async_trait::async_trait;
use hyper::Response;
use hyper::body::Bytes;
use std::sync::Arc;

/// Reports upstream reachability by relaying the subscription endpoint.
pub struct HealthHandler {
    dispatcher: Dispatcher,
    builder: Arc<QueryBuilder>,
}

impl HealthHandler {
    pub fn new(dispatcher: Dispatcher, builder: Arc<QueryBuilder>) -> Self {
        Self { dispatcher, builder }
    }
}

#[async_trait]
impl Handler for HealthHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError> {
        let (call, result) = self
            .dispatcher
            .dispatch(ctx, self.builder.subscription(), Defaults::AsIs)
            .await?
            .into_success()?;

        upstream_response(ctx, &call, &result.into_payload())
    }
}
