use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Method, Uri};
use indexmap::IndexMap;
use uuid::Uuid;

/// Logical route an inbound request was matched to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteName {
    Health,
    LocalNews,
    BreakingNews,
    Passthrough,
    NotFound,
}

impl RouteName {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RouteName::Health => "health",
            RouteName::LocalNews => "local_news",
            RouteName::BreakingNews => "breaking_news",
            RouteName::Passthrough => "passthrough",
            RouteName::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for RouteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one inbound call, fixed at entry.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: String,
    route: RouteName,
    method: Method,
    uri: Uri,
    body: Bytes,
}

impl RequestContext {
    /// Builds the context, taking the request id from the first non-empty
    /// header in `request_id_headers` or generating a fresh one.
    pub fn new(
        parts: &Parts,
        body: Bytes,
        route: RouteName,
        request_id_headers: &[String],
    ) -> Self {
        let request_id = request_id_headers
            .iter()
            .filter_map(|name| parts.headers.get(name.as_str()))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            route,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            body,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn route(&self) -> RouteName {
        self.route
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decoded query string. Repeated keys keep their first value.
    pub fn query_params(&self) -> IndexMap<String, String> {
        let mut params = IndexMap::new();
        if let Some(query) = self.uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_request_id_from_first_matching_header() {
        let headers = vec!["x-request-id".to_string(), "cf-ray".to_string()];

        let ctx = RequestContext::new(
            &parts("/news/breaking", &[("cf-ray", "ray-1"), ("x-request-id", "req-1")]),
            Bytes::new(),
            RouteName::BreakingNews,
            &headers,
        );
        assert_eq!(ctx.request_id(), "req-1");

        let ctx = RequestContext::new(
            &parts("/news/breaking", &[("x-request-id", "  "), ("cf-ray", "ray-2")]),
            Bytes::new(),
            RouteName::BreakingNews,
            &headers,
        );
        assert_eq!(ctx.request_id(), "ray-2");
    }

    #[test]
    fn test_request_id_generated_when_absent() {
        let ctx = RequestContext::new(
            &parts("/news/breaking", &[]),
            Bytes::new(),
            RouteName::BreakingNews,
            &["x-request-id".to_string()],
        );
        assert!(Uuid::parse_str(ctx.request_id()).is_ok());
    }

    #[test]
    fn test_query_params_keep_first_value() {
        let ctx = RequestContext::new(
            &parts("/news/breaking?countries=us%2Cca&lang=en&lang=fr", &[]),
            Bytes::new(),
            RouteName::BreakingNews,
            &[],
        );
        let params = ctx.query_params();
        assert_eq!(params["countries"], "us,ca");
        assert_eq!(params["lang"], "en");
        assert_eq!(ctx.route().as_str(), "breaking_news");
    }
}
