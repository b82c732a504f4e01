use crate::config::Config;
use crate::context::{RequestContext, RouteName};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::upstream::{RawResponse, StaticCredential, TransportError, Upstream, UpstreamRequest};
use crate::Gateway;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&UpstreamRequest) -> Result<RawResponse, TransportError> + Send + Sync;

/// Upstream double that answers from a closure and records every request.
pub struct StubUpstream {
    responder: Box<Responder>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl StubUpstream {
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&UpstreamRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: RawResponse) -> Self {
        Self::with(move |_| Ok(response.clone()))
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, TransportError> {
        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

pub fn json_response(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body: Bytes::from(body.to_string()),
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn test_context(route: RouteName) -> RequestContext {
    let (parts, _) = Request::builder()
        .uri("/news/test")
        .header("x-request-id", "test-request")
        .body(())
        .unwrap()
        .into_parts();
    RequestContext::new(&parts, Bytes::new(), route, &["x-request-id".to_string()])
}

pub fn test_config() -> Config {
    serde_yaml::from_str(
        r#"
listener:
    host: 127.0.0.1
    port: 3000
admin_listener:
    host: 127.0.0.1
    port: 3001
"#,
    )
    .unwrap()
}

/// Gateway wired to `upstream`, with the default config and a fixed credential.
pub fn test_gateway(
    upstream: Arc<StubUpstream>,
    credential: Option<&str>,
) -> (Gateway, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let gateway = Gateway::new(
        test_config(),
        upstream,
        Arc::new(StaticCredential(credential.map(str::to_string))),
        sink.clone(),
    );
    (gateway, sink)
}
