use crate::context::RequestContext;
use crate::errors::{ErrorMapper, GatewayError};
use crate::query::CallSummary;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::http::make_error_response;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-news-request-id");
pub const ROUTE_HEADER: HeaderName = HeaderName::from_static("x-news-route");
pub const EFFECTIVE_QUERY_HEADER: HeaderName = HeaderName::from_static("x-news-effective-query");
pub const PAGE_HEADER: HeaderName = HeaderName::from_static("x-news-page");
pub const PAGE_SIZE_HEADER: HeaderName = HeaderName::from_static("x-news-page-size");

/// Serializes `value` into a JSON response.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Bytes>, GatewayError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| GatewayError::Internal(format!("failed to serialize response: {e}")))?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Bytes::from(bytes))
        .map_err(|e| GatewayError::Internal(format!("failed to build response: {e}")))
}

/// Adds the `x-news-*` headers describing the call behind a response.
///
/// Values that are not ASCII, or that a header cannot carry, are left out.
pub fn add_debug_headers(headers: &mut HeaderMap, ctx: &RequestContext, call: &CallSummary) {
    let values = [
        (REQUEST_ID_HEADER, Some(ctx.request_id())),
        (ROUTE_HEADER, Some(ctx.route().as_str())),
        (EFFECTIVE_QUERY_HEADER, call.effective_query.as_deref()),
        (PAGE_HEADER, call.page.as_deref()),
        (PAGE_SIZE_HEADER, call.page_size.as_deref()),
    ];

    for (name, value) in values {
        let value = value
            .filter(|v| v.is_ascii())
            .and_then(|v| HeaderValue::from_str(v).ok());
        if let Some(value) = value {
            headers.insert(name, value);
        }
    }
}

/// Successful JSON response annotated with the call that produced it.
pub fn upstream_response<T: Serialize>(
    ctx: &RequestContext,
    call: &CallSummary,
    payload: &T,
) -> Result<Response<Bytes>, GatewayError> {
    let mut response = json_response(StatusCode::OK, payload)?;
    add_debug_headers(response.headers_mut(), ctx, call);
    Ok(response)
}

/// Envelope response for `error`. Debug headers are attached only when an
/// upstream call was made.
pub fn error_response(
    ctx: &RequestContext,
    mapper: &ErrorMapper,
    error: &GatewayError,
) -> Response<Bytes> {
    let envelope = mapper.map(ctx, error);
    let mut response = match json_response(error.status_code(), &envelope) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                request_id = ctx.request_id(),
                error = %e,
                "Failed to build error envelope"
            );
            make_error_response(error.status_code())
        }
    };

    if let Some(call) = error.call() {
        add_debug_headers(response.headers_mut(), ctx, call);
    }
    response
}

/// Parses a body that must be a JSON object when present. An empty body is
/// an empty object.
pub fn parse_object_body(body: &Bytes) -> Result<Map<String, Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Request body must be a JSON object.".to_string()),
        Err(e) => Err(format!("Request body is not valid JSON: {e}")),
    }
}
