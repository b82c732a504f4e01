use crate::sanitizer::ParamScope;
use hyper::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// A ready-to-send description of one upstream call.
///
/// The HTTP verb is never stored: a call with a body is a POST, anything
/// else is a GET.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub path: String,
    pub params: IndexMap<String, String>,
    pub body: Option<Map<String, Value>>,
    pub scope: ParamScope,
}

impl QuerySpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: IndexMap::new(),
            body: None,
            scope: ParamScope::Endpoint,
        }
    }

    pub fn post(path: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            body: Some(body),
            ..Self::get(path)
        }
    }

    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_scope(mut self, scope: ParamScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn method(&self) -> Method {
        match self.body {
            Some(_) => Method::POST,
            None => Method::GET,
        }
    }

    /// Looks a parameter up in the body first (when there is one), then the query string.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let from_body = self
            .body
            .as_ref()
            .and_then(|body| body.get(key))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            });
        from_body.or_else(|| self.params.get(key).cloned())
    }

    /// Query parameters plus scalar body fields, for logs and debug headers.
    pub fn flattened_params(&self) -> IndexMap<String, String> {
        let mut flat = self.params.clone();
        if let Some(body) = &self.body {
            for (key, value) in body {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                flat.insert(key.clone(), rendered);
            }
        }
        flat
    }
}

/// What a caller can learn about the call that produced its response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallSummary {
    pub endpoint: String,
    pub params: IndexMap<String, String>,
    pub effective_query: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl From<&QuerySpec> for CallSummary {
    fn from(spec: &QuerySpec) -> Self {
        let effective_query = spec.lookup("q").or_else(|| {
            let lat = spec.lookup("lat")?;
            let lon = spec.lookup("lon")?;
            let radius = spec.lookup("radius").unwrap_or_default();
            Some(format!("lat={lat},lon={lon},radius={radius}"))
        });

        Self {
            endpoint: spec.path.clone(),
            params: spec.flattened_params(),
            effective_query,
            page: spec.lookup("page"),
            page_size: spec.lookup("page_size"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_follows_body() {
        assert_eq!(QuerySpec::get("/api/search").method(), Method::GET);
        assert_eq!(
            QuerySpec::post("/api/search_by_location", Map::new()).method(),
            Method::POST
        );
    }

    #[test]
    fn test_summary_of_search() {
        let spec = QuerySpec::get("/api/search")
            .with_param("q", "\"Austin\"")
            .with_param("page", 2)
            .with_param("page_size", 20);
        let summary = CallSummary::from(&spec);

        assert_eq!(summary.endpoint, "/api/search");
        assert_eq!(summary.effective_query.as_deref(), Some("\"Austin\""));
        assert_eq!(summary.page.as_deref(), Some("2"));
        assert_eq!(summary.page_size.as_deref(), Some("20"));
    }

    #[test]
    fn test_summary_of_coordinate_call() {
        let body = json!({"lat": 30.5, "lon": -97.0, "radius": 50, "page": 1})
            .as_object()
            .cloned()
            .unwrap();
        let summary = CallSummary::from(&QuerySpec::post("/api/search_by_location", body));

        assert_eq!(
            summary.effective_query.as_deref(),
            Some("lat=30.5,lon=-97.0,radius=50")
        );
        assert_eq!(summary.params["radius"], "50");
        assert_eq!(summary.page.as_deref(), Some("1"));
    }
}
