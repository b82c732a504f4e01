pub mod breaking_news;
pub mod health;
pub mod local_news;
pub mod passthrough;
pub mod utils;

use crate::context::RequestContext;
use crate::errors::GatewayError;
use async_trait::async_trait;
use hyper::Response;
use hyper::body::Bytes;

/// Handles one matched inbound route.
///
/// Upstream failures are returned as errors and turned into envelopes at the
/// service boundary, so handlers only build successful responses.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response<Bytes>, GatewayError>;
}
