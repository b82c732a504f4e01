//! Operator-facing diagnostic events.
//!
//! Components never log decisions inline; they describe them as a
//! [`DiagnosticEvent`] and hand it to the injected [`DiagnosticSink`]. The
//! production sink forwards to `tracing`, tests record events and assert on
//! them. Nothing emitted here ever reaches the caller.

use crate::context::RouteName;
use indexmap::IndexMap;

/// Why an article was removed from a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    Country,
    Language,
    NotBreaking,
    MissingTimestamp,
    FutureTimestamp,
}

impl DropReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::Country => "country",
            DropReason::Language => "language",
            DropReason::NotBreaking => "not_breaking",
            DropReason::MissingTimestamp => "missing_timestamp",
            DropReason::FutureTimestamp => "future_timestamp",
        }
    }
}

/// Why a route moved on to its fallback query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackCause {
    EmptyResult,
    UpstreamFailure,
}

impl FallbackCause {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FallbackCause::EmptyResult => "empty_result",
            FallbackCause::UpstreamFailure => "upstream_failure",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticEvent {
    ParamsSanitized {
        route: RouteName,
        request_id: String,
        endpoint: String,
        retained: Vec<String>,
        removed: Vec<String>,
    },
    ArticleDropped {
        route: RouteName,
        request_id: String,
        link: String,
        reason: DropReason,
    },
    FallbackTriggered {
        route: RouteName,
        request_id: String,
        from: String,
        to: String,
        cause: FallbackCause,
    },
    RequestFailed {
        route: RouteName,
        request_id: String,
        endpoint: Option<String>,
        params: IndexMap<String, String>,
        status: u16,
        body: Option<String>,
        error: String,
    },
}

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::ParamsSanitized {
                route,
                request_id,
                endpoint,
                retained,
                removed,
            } => {
                if removed.is_empty() {
                    tracing::debug!(
                        %route,
                        %request_id,
                        %endpoint,
                        ?retained,
                        "Parameters retained"
                    );
                } else {
                    tracing::info!(
                        %route,
                        %request_id,
                        %endpoint,
                        ?retained,
                        ?removed,
                        "Parameters removed"
                    );
                }
            }
            DiagnosticEvent::ArticleDropped {
                route,
                request_id,
                link,
                reason,
            } => {
                tracing::info!(
                    %route,
                    %request_id,
                    link = %link,
                    reason = reason.as_str(),
                    "Dropping article"
                );
            }
            DiagnosticEvent::FallbackTriggered {
                route,
                request_id,
                from,
                to,
                cause,
            } => {
                tracing::info!(
                    %route,
                    %request_id,
                    %from,
                    %to,
                    cause = cause.as_str(),
                    "Falling back"
                );
            }
            DiagnosticEvent::RequestFailed {
                route,
                request_id,
                endpoint,
                params,
                status,
                body,
                error,
            } => {
                tracing::warn!(
                    %route,
                    %request_id,
                    endpoint = endpoint.as_deref().unwrap_or("-"),
                    ?params,
                    status,
                    body = body.as_deref().unwrap_or(""),
                    %error,
                    "Request failed"
                );
            }
        }
    }
}
