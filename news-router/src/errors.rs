use crate::config::ValidationError;
use crate::context::RequestContext;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::query::CallSummary;
use crate::upstream::TransportError;
use hyper::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "The news API credential is not configured on this gateway.";
pub const MALFORMED_RESPONSE_MESSAGE: &str =
    "The news API returned a response that could not be read.";
pub const INTERNAL_ERROR_MESSAGE: &str = "The gateway failed to process this request.";

/// Errors that can occur while running the news router itself
#[derive(Error, Debug)]
pub enum NewsRouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
}

/// Everything that can turn a request into an error response
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("upstream credential is missing")]
    MissingCredential,

    #[error("{0}")]
    ClientInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("request to {} failed: {source}", call.endpoint)]
    UpstreamTransport {
        call: CallSummary,
        source: TransportError,
    },

    #[error("{} responded with status {status}", call.endpoint)]
    UpstreamStatus {
        call: CallSummary,
        status: StatusCode,
        body: String,
    },

    #[error("{} returned a malformed payload: {reason}", call.endpoint)]
    MalformedResponse {
        call: CallSummary,
        reason: String,
        body: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingCredential | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::ClientInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTransport { .. } | GatewayError::MalformedResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            // Only error statuses are propagated; anything else the upstream
            // sends in place of a 200 is reported as a bad gateway.
            GatewayError::UpstreamStatus { status, .. }
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            GatewayError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// The upstream call behind the error, if one was made.
    pub fn call(&self) -> Option<&CallSummary> {
        match self {
            GatewayError::UpstreamTransport { call, .. }
            | GatewayError::UpstreamStatus { call, .. }
            | GatewayError::MalformedResponse { call, .. } => Some(call),
            _ => None,
        }
    }

    fn upstream_body(&self) -> Option<&str> {
        match self {
            GatewayError::UpstreamStatus { body, .. }
            | GatewayError::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// The JSON body of every error response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub status: String,
    pub message: String,
    pub request_id: String,
}

/// Converts errors into caller-facing envelopes and operator-facing diagnostics.
#[derive(Clone)]
pub struct ErrorMapper {
    max_body_chars: usize,
    sink: Arc<dyn DiagnosticSink>,
}

impl ErrorMapper {
    pub fn new(max_body_chars: usize, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            max_body_chars,
            sink,
        }
    }

    /// Cuts `body` to the configured number of characters.
    pub fn truncate(&self, body: &str) -> String {
        match body.char_indices().nth(self.max_body_chars) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        }
    }

    pub fn map(&self, ctx: &RequestContext, error: &GatewayError) -> ErrorEnvelope {
        let status = error.status_code();
        let body = error.upstream_body().map(|body| self.truncate(body));

        self.sink.emit(DiagnosticEvent::RequestFailed {
            route: ctx.route(),
            request_id: ctx.request_id().to_string(),
            endpoint: error.call().map(|call| call.endpoint.clone()),
            params: error.call().map(|call| call.params.clone()).unwrap_or_default(),
            status: status.as_u16(),
            body: body.clone(),
            error: error.to_string(),
        });

        let message = match error {
            GatewayError::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
            GatewayError::ClientInput(message) | GatewayError::NotFound(message) => {
                message.clone()
            }
            GatewayError::UpstreamTransport { source, .. } => {
                format!("The news API could not be reached: {source}")
            }
            GatewayError::UpstreamStatus { status, .. } => match body.as_deref() {
                Some(text) if !text.trim().is_empty() => text.to_string(),
                _ => format!("The news API responded with status {}", status.as_u16()),
            },
            GatewayError::MalformedResponse { .. } => MALFORMED_RESPONSE_MESSAGE.to_string(),
            GatewayError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        };

        ErrorEnvelope {
            status_code: status.as_u16(),
            status: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message,
            request_id: ctx.request_id().to_string(),
        }
    }
}
