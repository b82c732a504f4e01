//! Parameter allow/deny filtering for upstream calls.
//!
//! Denied keys (geolocation-style fields by default) are removed everywhere
//! except on the endpoints whose override set names them. Passthrough calls
//! are additionally limited to a positive allowlist so callers cannot inject
//! arbitrary parameters upstream.

use crate::config::ParamsConfig;
use std::collections::{BTreeSet, HashMap};

/// Which rule set an upstream call is checked against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamScope {
    /// Calls the gateway builds itself
    Endpoint,
    /// Caller-shaped calls forwarded through the generic proxy
    Passthrough,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sanitized<C> {
    pub kept: C,
    pub removed: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Sanitizer {
    denied: BTreeSet<String>,
    overrides: HashMap<String, BTreeSet<String>>,
    passthrough_allowlist: BTreeSet<String>,
}

impl Sanitizer {
    pub fn new(config: &ParamsConfig) -> Self {
        let lower = |keys: &BTreeSet<String>| {
            keys.iter()
                .map(|k| k.to_ascii_lowercase())
                .collect::<BTreeSet<_>>()
        };

        Self {
            denied: lower(&config.denied),
            overrides: config
                .overrides
                .iter()
                .map(|(endpoint, keys)| (endpoint.clone(), lower(keys)))
                .collect(),
            passthrough_allowlist: config.passthrough_allowlist.clone(),
        }
    }

    /// Whether `key` may be sent to `endpoint`. Denylist matching ignores case.
    pub fn permits(&self, endpoint: &str, scope: ParamScope, key: &str) -> bool {
        if scope == ParamScope::Passthrough && !self.passthrough_allowlist.contains(key) {
            return false;
        }

        let folded = key.to_ascii_lowercase();
        if !self.denied.contains(&folded) {
            return true;
        }

        self.overrides
            .get(endpoint)
            .is_some_and(|allowed| allowed.contains(&folded))
    }

    /// Splits `entries` into permitted pairs (order preserved) and removed keys.
    pub fn sanitize<I, V, C>(&self, endpoint: &str, scope: ParamScope, entries: I) -> Sanitized<C>
    where
        I: IntoIterator<Item = (String, V)>,
        C: FromIterator<(String, V)>,
    {
        let mut removed = Vec::new();
        let kept = entries
            .into_iter()
            .filter(|(key, _)| {
                let permitted = self.permits(endpoint, scope, key);
                if !permitted {
                    removed.push(key.clone());
                }
                permitted
            })
            .collect();

        Sanitized { kept, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::{Map, Value, json};
    use std::collections::BTreeMap;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(&ParamsConfig::default())
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_denied_keys_removed_for_regular_endpoints() {
        let result: Sanitized<IndexMap<String, String>> = sanitizer().sanitize(
            "/api/search",
            ParamScope::Endpoint,
            params(&[
                ("q", "news"),
                ("lat", "1"),
                ("LON", "2"),
                ("geo", "x"),
                ("location", "y"),
                ("page", "1"),
            ]),
        );

        assert_eq!(
            result.kept.keys().collect::<Vec<_>>(),
            vec!["q", "page"],
            "order of retained keys is preserved"
        );
        assert_eq!(result.removed, vec!["lat", "LON", "geo", "location"]);
    }

    #[test]
    fn test_override_only_applies_to_its_endpoint() {
        let s = sanitizer();
        assert!(s.permits("/api/search_by_location", ParamScope::Endpoint, "lat"));
        assert!(s.permits("/api/search_by_location", ParamScope::Endpoint, "lon"));
        // Not part of the override set
        assert!(!s.permits("/api/search_by_location", ParamScope::Endpoint, "geo"));
        // Same key on any other endpoint
        assert!(!s.permits("/api/search", ParamScope::Endpoint, "lat"));
        assert!(!s.permits("/api/latest_headlines", ParamScope::Endpoint, "lon"));
    }

    #[test]
    fn test_passthrough_requires_allowlist() {
        let s = sanitizer();
        let body: Map<String, Value> = json!({
            "q": "rust",
            "lang": "en",
            "api_key": "stolen",
            "lat": 30.1,
        })
        .as_object()
        .cloned()
        .unwrap();

        let result: Sanitized<Map<String, Value>> =
            s.sanitize("/api/search", ParamScope::Passthrough, body);

        assert_eq!(result.kept.len(), 2);
        assert!(result.kept.contains_key("q"));
        assert!(result.kept.contains_key("lang"));
        let mut removed = result.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["api_key", "lat"]);
    }

    #[test]
    fn test_denied_key_never_forwarded_without_override() {
        let mut config = ParamsConfig::default();
        config.overrides = BTreeMap::from([(
            "/api/custom".to_string(),
            BTreeSet::from(["geo".to_string()]),
        )]);
        config.passthrough_allowlist.insert("geo".to_string());
        let s = Sanitizer::new(&config);

        for endpoint in ["/api/search", "/api/search_by_location", "/api/custom"] {
            for scope in [ParamScope::Endpoint, ParamScope::Passthrough] {
                for key in ["location", "lat", "lon", "geo"] {
                    let allowed = s.permits(endpoint, scope, key);
                    let overridden = endpoint == "/api/custom" && key == "geo";
                    assert_eq!(allowed, overridden, "{endpoint} {scope:?} {key}");
                }
            }
        }
    }
}
