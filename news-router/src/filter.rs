use crate::articles::Article;
use crate::context::RequestContext;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, DropReason};
use crate::input::{BreakingNewsInput, as_text, country_set, first_language};
use crate::metrics_defs::ARTICLES_DROPPED;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use shared::counter;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Constraints every returned article must satisfy.
///
/// Derived once from the caller's request and reused for the primary and
/// any fallback result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Uppercased ISO codes; empty means any country
    pub countries: BTreeSet<String>,
    /// Lowercased language tag
    pub language: Option<String>,
    pub require_breaking_flag: bool,
    pub require_non_future_timestamp: bool,
}

impl FilterCriteria {
    pub fn local(countries: &[String], language: &str) -> Self {
        Self {
            countries: countries.iter().map(|c| c.to_ascii_uppercase()).collect(),
            language: Some(language.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn breaking(input: &BreakingNewsInput) -> Self {
        Self {
            countries: input.countries.clone(),
            language: Some(input.language.clone()),
            require_breaking_flag: true,
            require_non_future_timestamp: true,
        }
    }

    /// Same criteria for a feed whose articles carry no breaking flag.
    pub fn without_breaking_flag(&self) -> Self {
        Self {
            require_breaking_flag: false,
            ..self.clone()
        }
    }

    /// Country and language constraints a passthrough caller asked the
    /// upstream for, read from the query string first and then the body.
    pub fn from_passthrough(
        params: &IndexMap<String, String>,
        body: Option<&Map<String, Value>>,
    ) -> Self {
        let lookup = |keys: &[&str]| -> Option<String> {
            let from_query = keys
                .iter()
                .filter_map(|key| params.get(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty());
            from_query.or_else(|| {
                let body = body?;
                keys.iter()
                    .filter_map(|key| body.get(*key))
                    .find_map(as_text)
            })
        };

        Self {
            countries: lookup(&["countries", "country"])
                .map(|raw| country_set(&raw))
                .unwrap_or_default(),
            language: lookup(&["lang", "language", "languages"])
                .and_then(|raw| first_language(&raw)),
            ..Self::default()
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.countries.is_empty()
            && self.language.is_none()
            && !self.require_breaking_flag
            && !self.require_non_future_timestamp
    }

    /// First reason `article` fails these criteria, if any.
    pub fn rejects(&self, article: &Article, dispatched_at: DateTime<Utc>) -> Option<DropReason> {
        if !self.countries.is_empty()
            && !article
                .country()
                .is_some_and(|country| self.countries.contains(&country))
        {
            return Some(DropReason::Country);
        }

        if self
            .language
            .as_ref()
            .is_some_and(|language| article.language().as_ref() != Some(language))
        {
            return Some(DropReason::Language);
        }

        if self.require_breaking_flag && !article.is_breaking_news() {
            return Some(DropReason::NotBreaking);
        }

        if self.require_non_future_timestamp {
            match article.published_at() {
                None => return Some(DropReason::MissingTimestamp),
                Some(published) if published > dispatched_at => {
                    return Some(DropReason::FutureTimestamp);
                }
                Some(_) => {}
            }
        }

        None
    }
}

/// Applies [`FilterCriteria`] to upstream articles, reporting every drop.
#[derive(Clone)]
pub struct ResponseFilter {
    sink: Arc<dyn DiagnosticSink>,
}

impl ResponseFilter {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    pub fn apply(
        &self,
        ctx: &RequestContext,
        criteria: &FilterCriteria,
        articles: Vec<Article>,
        dispatched_at: DateTime<Utc>,
    ) -> Vec<Article> {
        if criteria.is_unconstrained() {
            return articles;
        }

        articles
            .into_iter()
            .filter(|article| match criteria.rejects(article, dispatched_at) {
                None => true,
                Some(reason) => {
                    counter!(ARTICLES_DROPPED, "reason" => reason.as_str()).increment(1);
                    self.sink.emit(DiagnosticEvent::ArticleDropped {
                        route: ctx.route(),
                        request_id: ctx.request_id().to_string(),
                        link: article.link().unwrap_or("unknown").to_string(),
                        reason,
                    });
                    false
                }
            })
            .collect()
    }
}
