use crate::config::RoutesConfig;
use crate::context::RouteName;
use hyper::Method;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
enum PathMatch {
    Exact(String),
    /// Anything strictly below this prefix
    Prefix(String),
}

#[derive(Clone, Debug)]
struct Route {
    path: PathMatch,
    /// Empty means any method
    methods: Vec<Method>,
    name: RouteName,
}

/// Matches inbound requests against the configured routes, first match wins.
#[derive(Clone, Debug)]
pub struct Router {
    routes: Arc<Vec<Route>>,
    proxy_prefix: String,
}

impl Router {
    pub fn new(config: &RoutesConfig) -> Self {
        let proxy_prefix = config.proxy_prefix.trim_end_matches('/').to_string();
        let routes = vec![
            Route {
                path: PathMatch::Exact(config.health.clone()),
                methods: vec![],
                name: RouteName::Health,
            },
            Route {
                path: PathMatch::Exact(config.local_news.clone()),
                methods: vec![Method::POST],
                name: RouteName::LocalNews,
            },
            Route {
                path: PathMatch::Exact(config.breaking_news.clone()),
                methods: vec![Method::GET],
                name: RouteName::BreakingNews,
            },
            Route {
                path: PathMatch::Prefix(proxy_prefix.clone()),
                methods: vec![Method::GET, Method::POST],
                name: RouteName::Passthrough,
            },
        ];

        Self {
            routes: Arc::new(routes),
            proxy_prefix,
        }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> RouteName {
        match self.routes.iter().find(|route| route.matches(method, path)) {
            Some(route) => {
                tracing::debug!(%method, path, route = %route.name, "Matched route");
                route.name
            }
            None => {
                tracing::debug!(%method, path, "No route matched");
                RouteName::NotFound
            }
        }
    }

    /// Part of `path` below the passthrough prefix, including its leading `/`.
    pub fn passthrough_suffix<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.proxy_prefix.as_str())
            .filter(|suffix| suffix.len() > 1 && suffix.starts_with('/'))
    }
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        let path_matches = match &self.path {
            PathMatch::Exact(expected) => path == expected,
            PathMatch::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|suffix| suffix.len() > 1 && suffix.starts_with('/')),
        };

        path_matches && (self.methods.is_empty() || self.methods.contains(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new(&RoutesConfig::default())
    }

    #[test]
    fn test_named_routes() {
        let r = router();
        assert_eq!(r.resolve(&Method::GET, "/news/__health"), RouteName::Health);
        assert_eq!(r.resolve(&Method::POST, "/news/__health"), RouteName::Health);
        assert_eq!(r.resolve(&Method::POST, "/local/local-news"), RouteName::LocalNews);
        assert_eq!(r.resolve(&Method::GET, "/news/breaking"), RouteName::BreakingNews);
    }

    #[test]
    fn test_method_matching() {
        let r = router();
        // Wrong method on an exact route falls through to the next match
        assert_eq!(r.resolve(&Method::GET, "/local/local-news"), RouteName::NotFound);
        assert_eq!(r.resolve(&Method::POST, "/news/breaking"), RouteName::Passthrough);
        assert_eq!(r.resolve(&Method::DELETE, "/news/search"), RouteName::NotFound);
    }

    #[test]
    fn test_passthrough_prefix() {
        let r = router();
        assert_eq!(r.resolve(&Method::GET, "/news/search"), RouteName::Passthrough);
        assert_eq!(r.resolve(&Method::POST, "/news/api/search"), RouteName::Passthrough);
        assert_eq!(r.resolve(&Method::GET, "/news"), RouteName::NotFound);
        assert_eq!(r.resolve(&Method::GET, "/news/"), RouteName::NotFound);
        assert_eq!(r.resolve(&Method::GET, "/newsroom/search"), RouteName::NotFound);
        assert_eq!(r.resolve(&Method::GET, "/"), RouteName::NotFound);

        assert_eq!(r.passthrough_suffix("/news/api/search"), Some("/api/search"));
        assert_eq!(r.passthrough_suffix("/newsroom"), None);
    }

    #[test]
    fn test_custom_paths() {
        let config = RoutesConfig {
            health: "/status".to_string(),
            local_news: "/v2/local".to_string(),
            breaking_news: "/v2/breaking".to_string(),
            proxy_prefix: "/v2/".to_string(),
        };
        let r = Router::new(&config);
        assert_eq!(r.resolve(&Method::GET, "/status"), RouteName::Health);
        assert_eq!(r.resolve(&Method::GET, "/v2/breaking"), RouteName::BreakingNews);
        assert_eq!(r.resolve(&Method::GET, "/v2/search"), RouteName::Passthrough);
        assert_eq!(r.resolve(&Method::GET, "/news/search"), RouteName::NotFound);
    }
}
