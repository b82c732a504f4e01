//! Fallback cascades for the local-news and breaking-news routes.
//!
//! Each route is an explicit state machine. An attempt dispatches one query,
//! filters the result with the criteria derived from the original request
//! and is classified as an [`AttemptStatus`]; the state's `next` decides
//! whether another query follows. No route makes more than two calls.

use crate::articles::Article;
use crate::config::PaginationConfig;
use crate::context::RequestContext;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, FallbackCause};
use crate::dispatcher::{Defaults, Dispatcher};
use crate::errors::GatewayError;
use crate::filter::{FilterCriteria, ResponseFilter};
use crate::input::{BreakingNewsInput, LocalNewsInput};
use crate::metrics_defs::FALLBACKS;
use crate::query::{CallSummary, QuerySpec};
use crate::query_builder::{LocalQuery, QueryBuilder};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use shared::counter;
use std::sync::Arc;

pub const LOCAL_EMPTY_REASON: &str = "No local articles matched this request.";
pub const BREAKING_EMPTY_REASON: &str =
    "No breaking news or latest headlines matched this request.";

/// How a single attempt ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptStatus {
    /// 200 with at least one article left after filtering
    Found,
    /// 200 with nothing left after filtering
    Empty,
    /// Non-200 status or transport failure
    UpstreamFailed,
    /// Anything no fallback can repair (missing credential, malformed payload)
    Fatal,
}

impl AttemptStatus {
    fn of(attempt: &Result<Attempt, GatewayError>) -> Self {
        match attempt {
            Ok(attempt) if attempt.articles.is_empty() => AttemptStatus::Empty,
            Ok(_) => AttemptStatus::Found,
            Err(GatewayError::UpstreamStatus { .. } | GatewayError::UpstreamTransport { .. }) => {
                AttemptStatus::UpstreamFailed
            }
            Err(_) => AttemptStatus::Fatal,
        }
    }

    fn fallback_cause(self) -> FallbackCause {
        match self {
            AttemptStatus::UpstreamFailed => FallbackCause::UpstreamFailure,
            _ => FallbackCause::EmptyResult,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalState {
    Coordinates,
    FreeText,
    SearchFallback,
}

impl LocalState {
    /// Only a coordinate lookup that came back empty or failed gets a second try.
    pub fn next(self, status: AttemptStatus) -> Option<LocalState> {
        match (self, status) {
            (LocalState::Coordinates, AttemptStatus::Empty | AttemptStatus::UpstreamFailed) => {
                Some(LocalState::SearchFallback)
            }
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            LocalState::Coordinates => "coordinates",
            LocalState::FreeText => "free_text",
            LocalState::SearchFallback => "search",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakingState {
    Breaking,
    LatestHeadlines,
}

impl BreakingState {
    /// Errors end the cascade; only an empty breaking feed moves on.
    pub fn next(self, status: AttemptStatus) -> Option<BreakingState> {
        match (self, status) {
            (BreakingState::Breaking, AttemptStatus::Empty) => Some(BreakingState::LatestHeadlines),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            BreakingState::Breaking => "breaking_news",
            BreakingState::LatestHeadlines => "latest_headlines",
        }
    }
}

/// A successful, filtered upstream call
#[derive(Clone, Debug)]
struct Attempt {
    call: CallSummary,
    payload: Map<String, Value>,
    articles: Vec<Article>,
}

/// Final response of a route, ready to serialize.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteOutcome {
    pub payload: Map<String, Value>,
    /// The call whose result is returned
    pub call: CallSummary,
}

impl RouteOutcome {
    fn new(attempt: Attempt, fallback: Option<&str>, empty_reason: &str) -> Self {
        let Attempt {
            call,
            mut payload,
            articles,
        } = attempt;
        let empty = articles.is_empty();

        payload.insert(
            "articles".to_string(),
            Value::Array(articles.into_iter().map(Article::into_value).collect()),
        );
        if let Some(fallback) = fallback {
            payload.insert("fallback".to_string(), Value::String(fallback.to_string()));
        }
        if empty {
            payload.insert("reason".to_string(), Value::String(empty_reason.to_string()));
        }

        Self { payload, call }
    }

    pub fn articles(&self) -> &[Value] {
        self.payload
            .get("articles")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    dispatcher: Dispatcher,
    builder: Arc<QueryBuilder>,
    filter: ResponseFilter,
    sink: Arc<dyn DiagnosticSink>,
    pagination: PaginationConfig,
    local_countries: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        dispatcher: Dispatcher,
        builder: Arc<QueryBuilder>,
        sink: Arc<dyn DiagnosticSink>,
        pagination: PaginationConfig,
        local_countries: Vec<String>,
    ) -> Self {
        Self {
            dispatcher,
            builder,
            filter: ResponseFilter::new(sink.clone()),
            sink,
            pagination,
            local_countries,
        }
    }

    pub async fn local_news(
        &self,
        ctx: &RequestContext,
        body: &Map<String, Value>,
    ) -> Result<RouteOutcome, GatewayError> {
        let input = LocalNewsInput::from_body(body, &self.pagination);
        let criteria = FilterCriteria::local(&self.local_countries, &input.language);

        let (mut state, mut spec) = match self.builder.local_news(&input) {
            LocalQuery::Coordinates(spec) => (LocalState::Coordinates, spec),
            LocalQuery::FreeText(spec) => (LocalState::FreeText, spec),
        };

        loop {
            let attempt = self.attempt(ctx, spec, &criteria).await;
            let status = AttemptStatus::of(&attempt);

            match state.next(status) {
                Some(next) => {
                    self.fallback(ctx, state.as_str(), next.as_str(), status);
                    state = next;
                    spec = self.builder.local_search(&input);
                }
                None => {
                    let fallback = (state == LocalState::SearchFallback).then_some(state.as_str());
                    return Ok(RouteOutcome::new(attempt?, fallback, LOCAL_EMPTY_REASON));
                }
            }
        }
    }

    pub async fn breaking_news(
        &self,
        ctx: &RequestContext,
        query: &IndexMap<String, String>,
    ) -> Result<RouteOutcome, GatewayError> {
        let input = BreakingNewsInput::from_query(query, &self.pagination);
        let criteria = FilterCriteria::breaking(&input);

        let mut state = BreakingState::Breaking;
        let mut attempt = self
            .attempt(ctx, self.builder.breaking_news(&input), &criteria)
            .await;

        while let Some(next) = state.next(AttemptStatus::of(&attempt)) {
            self.fallback(ctx, state.as_str(), next.as_str(), AttemptStatus::of(&attempt));
            state = next;
            attempt = self
                .attempt(
                    ctx,
                    self.builder.latest_headlines(&input),
                    &criteria.without_breaking_flag(),
                )
                .await;
        }

        let fallback = (state == BreakingState::LatestHeadlines).then_some(state.as_str());
        Ok(RouteOutcome::new(attempt?, fallback, BREAKING_EMPTY_REASON))
    }

    async fn attempt(
        &self,
        ctx: &RequestContext,
        spec: QuerySpec,
        criteria: &FilterCriteria,
    ) -> Result<Attempt, GatewayError> {
        let (call, result) = self
            .dispatcher
            .dispatch(ctx, spec, Defaults::Enforce)
            .await?
            .into_success()?;

        let articles = self
            .filter
            .apply(ctx, criteria, result.articles, result.dispatched_at);
        Ok(Attempt {
            call,
            payload: result.payload,
            articles,
        })
    }

    fn fallback(&self, ctx: &RequestContext, from: &str, to: &str, status: AttemptStatus) {
        let cause = status.fallback_cause();
        counter!(FALLBACKS, "route" => ctx.route().as_str(), "cause" => cause.as_str())
            .increment(1);
        self.sink.emit(DiagnosticEvent::FallbackTriggered {
            route: ctx.route(),
            request_id: ctx.request_id().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            cause,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointsConfig, ParamsConfig};
    use crate::context::RouteName;
    use crate::query_builder::StateNames;
    use crate::sanitizer::Sanitizer;
    use crate::testutils::{RecordingSink, StubUpstream, json_response, test_context};
    use crate::upstream::{StaticCredential, TransportError, UpstreamRequest};
    use chrono::{Duration, Utc};
    use hyper::StatusCode;
    use serde_json::json;

    fn orchestrator(stub: Arc<StubUpstream>) -> (Orchestrator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let pagination = PaginationConfig::default();
        let dispatcher = Dispatcher::new(
            stub,
            Arc::new(StaticCredential(Some("token".to_string()))),
            Arc::new(Sanitizer::new(&ParamsConfig::default())),
            pagination.clone(),
            sink.clone(),
        );
        let builder = QueryBuilder::new(
            StateNames::us(),
            EndpointsConfig::default(),
            pagination.clone(),
            50.0,
        );
        let orchestrator = Orchestrator::new(
            dispatcher,
            Arc::new(builder),
            sink.clone(),
            pagination,
            vec!["US".to_string()],
        );
        (orchestrator, sink)
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn articles(items: Value) -> String {
        json!({"status": "ok", "articles": items}).to_string()
    }

    fn breaking_article(title: &str) -> Value {
        json!({
            "title": title,
            "country": "US",
            "language": "en",
            "is_breaking_news": true,
            "published_date": (Utc::now() - Duration::minutes(5)).to_rfc3339(),
        })
    }

    fn headline(title: &str, country: &str) -> Value {
        json!({
            "title": title,
            "country": country,
            "language": "en",
            "published_date": (Utc::now() - Duration::minutes(5)).to_rfc3339(),
        })
    }

    fn fallback_events(sink: &RecordingSink) -> Vec<(String, String, FallbackCause)> {
        sink.events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::FallbackTriggered {
                    from,
                    to,
                    cause,
                    ..
                } => Some((from, to, cause)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_local_transitions() {
        use AttemptStatus::*;
        assert_eq!(LocalState::Coordinates.next(Empty), Some(LocalState::SearchFallback));
        assert_eq!(
            LocalState::Coordinates.next(UpstreamFailed),
            Some(LocalState::SearchFallback)
        );
        assert_eq!(LocalState::Coordinates.next(Found), None);
        assert_eq!(LocalState::Coordinates.next(Fatal), None);
        for status in [Found, Empty, UpstreamFailed, Fatal] {
            assert_eq!(LocalState::FreeText.next(status), None);
            assert_eq!(LocalState::SearchFallback.next(status), None);
        }
    }

    #[test]
    fn test_breaking_transitions() {
        use AttemptStatus::*;
        assert_eq!(
            BreakingState::Breaking.next(Empty),
            Some(BreakingState::LatestHeadlines)
        );
        for status in [Found, UpstreamFailed, Fatal] {
            assert_eq!(BreakingState::Breaking.next(status), None);
        }
        for status in [Found, Empty, UpstreamFailed, Fatal] {
            assert_eq!(BreakingState::LatestHeadlines.next(status), None);
        }
    }

    #[tokio::test]
    async fn test_breaking_primary_hit() {
        let stub = Arc::new(StubUpstream::always(json_response(
            200,
            &articles(json!([breaking_article("a")])),
        )));
        let (orchestrator, sink) = orchestrator(stub.clone());

        let outcome = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &IndexMap::new())
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 1);
        assert_eq!(outcome.articles().len(), 1);
        assert_eq!(outcome.payload["status"], json!("ok"));
        assert!(!outcome.payload.contains_key("fallback"));
        assert!(!outcome.payload.contains_key("reason"));
        assert_eq!(outcome.call.endpoint, "/api/breaking_news");
        assert!(fallback_events(&sink).is_empty());
    }

    #[tokio::test]
    async fn test_breaking_falls_back_to_headlines_with_same_criteria() {
        let stub = Arc::new(StubUpstream::with(|request: &UpstreamRequest| {
            let body = if request.path == "/api/breaking_news" {
                // Not flagged as breaking, so filtered away
                articles(json!([headline("stale", "US")]))
            } else {
                articles(json!([headline("gb", "GB"), headline("us", "US")]))
            };
            Ok(json_response(200, &body))
        }));
        let (orchestrator, sink) = orchestrator(stub.clone());

        let outcome = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &IndexMap::new())
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].path, "/api/latest_headlines");
        assert_eq!(requests[1].params["page_size"], "10");
        assert_eq!(outcome.payload["fallback"], json!("latest_headlines"));
        assert!(!outcome.payload.contains_key("reason"));
        assert_eq!(outcome.articles().len(), 1);
        assert_eq!(outcome.articles()[0]["title"], json!("us"));
        assert_eq!(outcome.call.endpoint, "/api/latest_headlines");
        assert_eq!(
            fallback_events(&sink),
            vec![(
                "breaking_news".to_string(),
                "latest_headlines".to_string(),
                FallbackCause::EmptyResult
            )]
        );
    }

    #[tokio::test]
    async fn test_breaking_both_empty_carries_reason() {
        let stub = Arc::new(StubUpstream::always(json_response(200, &articles(json!([])))));
        let (orchestrator, _) = orchestrator(stub.clone());

        let outcome = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &IndexMap::new())
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 2);
        assert_eq!(outcome.payload["fallback"], json!("latest_headlines"));
        assert_eq!(outcome.payload["reason"], json!(BREAKING_EMPTY_REASON));
        assert!(outcome.articles().is_empty());
    }

    #[tokio::test]
    async fn test_breaking_error_is_not_retried() {
        let stub = Arc::new(StubUpstream::always(json_response(429, "quota exceeded")));
        let (orchestrator, _) = orchestrator(stub.clone());

        let error = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &IndexMap::new())
            .await
            .unwrap_err();

        assert_eq!(stub.call_count(), 1);
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_local_free_text_empty_has_reason_and_no_fallback() {
        let stub = Arc::new(StubUpstream::always(json_response(
            200,
            r#"{"status": "No matches"}"#,
        )));
        let (orchestrator, sink) = orchestrator(stub.clone());

        let outcome = orchestrator
            .local_news(
                &test_context(RouteName::LocalNews),
                &body(json!({"city": "Austin", "state": "tx"})),
            )
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.requests()[0].params["q"], "\"Austin\" OR \"Texas\"");
        assert_eq!(outcome.payload["reason"], json!(LOCAL_EMPTY_REASON));
        assert!(!outcome.payload.contains_key("fallback"));
        assert!(fallback_events(&sink).is_empty());
    }

    #[tokio::test]
    async fn test_local_coordinates_fail_then_search() {
        let stub = Arc::new(StubUpstream::with(|request: &UpstreamRequest| {
            if request.path == "/api/search_by_location" {
                Err(TransportError::Timeout(10))
            } else {
                Ok(json_response(
                    200,
                    &articles(json!([
                        {"title": "local", "country": "US", "language": "en"},
                        {"title": "abroad", "country": "FR", "language": "en"},
                    ])),
                ))
            }
        }));
        let (orchestrator, sink) = orchestrator(stub.clone());

        let outcome = orchestrator
            .local_news(
                &test_context(RouteName::LocalNews),
                &body(json!({"lat": 30.2, "lon": -97.7, "city": "Austin"})),
            )
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body.as_ref().unwrap()["lat"], json!(30.2));
        assert_eq!(requests[1].path, "/api/search");
        assert_eq!(requests[1].params["q"], "\"Austin\"");
        assert!(!requests[1].params.contains_key("lat"));
        assert_eq!(outcome.payload["fallback"], json!("search"));
        assert_eq!(outcome.articles().len(), 1);
        assert_eq!(
            fallback_events(&sink),
            vec![(
                "coordinates".to_string(),
                "search".to_string(),
                FallbackCause::UpstreamFailure
            )]
        );
    }

    #[tokio::test]
    async fn test_local_fallback_failure_is_returned() {
        let stub = Arc::new(StubUpstream::always(json_response(500, "boom")));
        let (orchestrator, _) = orchestrator(stub.clone());

        let error = orchestrator
            .local_news(
                &test_context(RouteName::LocalNews),
                &body(json!({"lat": 1.0, "lon": 2.0})),
            )
            .await
            .unwrap_err();

        assert_eq!(stub.call_count(), 2, "never more than two calls");
        assert_eq!(error.call().unwrap().endpoint, "/api/search");
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_not_a_fallback_trigger() {
        let stub = Arc::new(StubUpstream::always(json_response(200, "not json")));
        let (orchestrator, _) = orchestrator(stub.clone());

        let error = orchestrator
            .local_news(
                &test_context(RouteName::LocalNews),
                &body(json!({"lat": 1.0, "lon": 2.0})),
            )
            .await
            .unwrap_err();

        assert_eq!(stub.call_count(), 1);
        assert!(matches!(error, GatewayError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_identical_requests_yield_identical_articles() {
        let stub = Arc::new(StubUpstream::always(json_response(
            200,
            &articles(json!([
                breaking_article("a"),
                headline("b", "US"),
                breaking_article("c"),
            ])),
        )));
        let (orchestrator, _) = orchestrator(stub);
        let query: IndexMap<String, String> = [("country".to_string(), "us".to_string())]
            .into_iter()
            .collect();

        let first = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &query)
            .await
            .unwrap();
        let second = orchestrator
            .breaking_news(&test_context(RouteName::BreakingNews), &query)
            .await
            .unwrap();

        assert_eq!(first.articles(), second.articles());
        assert_eq!(first.articles().len(), 2);
    }
}
