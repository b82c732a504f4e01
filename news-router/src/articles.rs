use chrono::{DateTime, NaiveDateTime, Utc};
use hyper::StatusCode;
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One upstream article.
///
/// Only a handful of fields are inspected; the record is otherwise carried
/// through untouched so no upstream field is lost or renamed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Article(Map<String, Value>);

impl Article {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn country(&self) -> Option<String> {
        self.text("country").map(str::to_ascii_uppercase)
    }

    pub fn language(&self) -> Option<String> {
        self.text("language").map(str::to_ascii_lowercase)
    }

    pub fn link(&self) -> Option<&str> {
        self.text("link")
    }

    /// Accepts a JSON boolean or the strings "true"/"false".
    pub fn is_breaking_news(&self) -> bool {
        match self.0.get("is_breaking_news") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// RFC 3339, or `YYYY-MM-DD HH:MM:SS` read as UTC.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.text("published_date")?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A 200 body that isn't the payload we expect
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MalformedPayload {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("body is not a JSON object")]
    NotAnObject,
    #[error("`articles` is not a list of objects")]
    InvalidArticles,
}

/// Outcome of one upstream call, before filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamResult {
    pub status: StatusCode,
    pub articles: Vec<Article>,
    /// Whether the payload carried an `articles` key at all
    pub articles_present: bool,
    /// Top-level fields other than `articles`, passed through as-is
    pub payload: Map<String, Value>,
    /// Body text of a non-200 response
    pub raw_body: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}

impl UpstreamResult {
    /// Parses a 200 payload. A missing `articles` key means no matches.
    pub fn parse(body: &Bytes, dispatched_at: DateTime<Utc>) -> Result<Self, MalformedPayload> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| MalformedPayload::InvalidJson(e.to_string()))?;
        let Value::Object(mut payload) = value else {
            return Err(MalformedPayload::NotAnObject);
        };

        let removed = payload.remove("articles");
        let articles_present = removed.is_some();
        let articles = match removed {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(fields) => Ok(Article::new(fields)),
                    _ => Err(MalformedPayload::InvalidArticles),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(MalformedPayload::InvalidArticles),
        };

        Ok(Self {
            status: StatusCode::OK,
            articles,
            articles_present,
            payload,
            raw_body: None,
            dispatched_at,
        })
    }

    pub fn failed(status: StatusCode, body: &Bytes, dispatched_at: DateTime<Utc>) -> Self {
        Self {
            status,
            articles: Vec::new(),
            articles_present: false,
            payload: Map::new(),
            raw_body: Some(String::from_utf8_lossy(body).into_owned()),
            dispatched_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// The payload as received, with `articles` put back only if it was there.
    pub fn into_payload(self) -> Map<String, Value> {
        let mut payload = self.payload;
        if self.articles_present {
            payload.insert(
                "articles".to_string(),
                Value::Array(self.articles.into_iter().map(Article::into_value).collect()),
            );
        }
        payload
    }
}
