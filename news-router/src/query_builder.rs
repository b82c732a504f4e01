//! Turns normalized client input into upstream calls.

use crate::config::{EndpointsConfig, PaginationConfig};
use crate::input::{BreakingNewsInput, LocalNewsInput};
use crate::query::QuerySpec;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Search text used when a local request names no place at all
pub const LOCAL_NEWS_TERM: &str = "local news";

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
    ("DC", "District of Columbia"),
];

/// Maps state codes to full names.
#[derive(Clone, Debug)]
pub struct StateNames {
    by_code: HashMap<String, String>,
}

impl StateNames {
    /// The 50 US states plus the District of Columbia.
    pub fn us() -> Self {
        Self::from_pairs(US_STATES.iter().copied())
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            by_code: pairs
                .into_iter()
                .map(|(code, name)| (code.to_ascii_uppercase(), name.to_string()))
                .collect(),
        }
    }

    /// Full name for a known code (any case); otherwise the trimmed input as given.
    pub fn normalize(&self, state: &str) -> Option<String> {
        let trimmed = state.trim();
        if trimmed.is_empty() {
            return None;
        }
        let name = self
            .by_code
            .get(&trimmed.to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string());
        Some(name)
    }
}

/// How a local-news primary call locates its articles
#[derive(Clone, Debug, PartialEq)]
pub enum LocalQuery {
    Coordinates(QuerySpec),
    FreeText(QuerySpec),
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    states: StateNames,
    endpoints: EndpointsConfig,
    pagination: PaginationConfig,
    default_radius_km: f64,
}

impl QueryBuilder {
    pub fn new(
        states: StateNames,
        endpoints: EndpointsConfig,
        pagination: PaginationConfig,
        default_radius_km: f64,
    ) -> Self {
        Self {
            states,
            endpoints,
            pagination,
            default_radius_km,
        }
    }

    /// Free-text search expression for a city and/or state.
    pub fn local_search_text(&self, city: Option<&str>, state: Option<&str>) -> String {
        let city = city.map(str::trim).filter(|c| !c.is_empty());
        let state = state.and_then(|s| self.states.normalize(s));

        match (city, state) {
            (Some(city), Some(state)) => format!("\"{city}\" OR \"{state}\""),
            (Some(city), None) => format!("\"{city}\""),
            (None, Some(state)) => format!("\"{state}\" {LOCAL_NEWS_TERM}"),
            (None, None) => LOCAL_NEWS_TERM.to_string(),
        }
    }

    /// Primary local-news call: by coordinates when both are usable, by text otherwise.
    pub fn local_news(&self, input: &LocalNewsInput) -> LocalQuery {
        match input.coordinates() {
            Some((lat, lon)) => LocalQuery::Coordinates(self.coordinate_search(input, lat, lon)),
            None => LocalQuery::FreeText(self.local_search(input)),
        }
    }

    /// Text search for the place named in `input`; also the coordinate fallback.
    pub fn local_search(&self, input: &LocalNewsInput) -> QuerySpec {
        let text = self.local_search_text(input.city.as_deref(), input.state.as_deref());

        QuerySpec::get(&self.endpoints.search)
            .with_param("q", text)
            .with_param("lang", &input.language)
            .with_param("page", input.pagination.page)
            .with_param("page_size", input.pagination.page_size)
    }

    fn coordinate_search(&self, input: &LocalNewsInput, lat: f64, lon: f64) -> QuerySpec {
        let radius = input.radius_km.unwrap_or(self.default_radius_km);

        let mut body = Map::new();
        body.insert("lat".to_string(), json!(lat));
        body.insert("lon".to_string(), json!(lon));
        body.insert("radius".to_string(), json!(radius));
        body.insert("lang".to_string(), Value::String(input.language.clone()));
        body.insert("page".to_string(), json!(input.pagination.page));
        body.insert("page_size".to_string(), json!(input.pagination.page_size));

        QuerySpec::post(&self.endpoints.search_by_location, body)
    }

    pub fn breaking_news(&self, input: &BreakingNewsInput) -> QuerySpec {
        QuerySpec::get(&self.endpoints.breaking_news)
            .with_param("countries", input.countries_param())
            .with_param("lang", &input.language)
            .with_param("page", input.pagination.page)
            .with_param("page_size", input.pagination.page_size)
    }

    /// Breaking-news fallback: first page of the latest headlines, fixed size.
    pub fn latest_headlines(&self, input: &BreakingNewsInput) -> QuerySpec {
        QuerySpec::get(&self.endpoints.latest_headlines)
            .with_param("countries", input.countries_param())
            .with_param("lang", &input.language)
            .with_param("page", 1)
            .with_param("page_size", self.pagination.fallback_page_size)
    }

    pub fn subscription(&self) -> QuerySpec {
        QuerySpec::get(&self.endpoints.subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(
            StateNames::us(),
            EndpointsConfig::default(),
            PaginationConfig::default(),
            50.0,
        )
    }

    fn local(value: serde_json::Value) -> LocalNewsInput {
        LocalNewsInput::from_body(value.as_object().unwrap(), &PaginationConfig::default())
    }

    #[test]
    fn test_state_normalization() {
        let states = StateNames::us();
        assert_eq!(states.normalize("tx").as_deref(), Some("Texas"));
        assert_eq!(states.normalize(" Dc ").as_deref(), Some("District of Columbia"));
        assert_eq!(states.normalize("ZZ").as_deref(), Some("ZZ"));
        assert_eq!(states.normalize("  ontario ").as_deref(), Some("ontario"));
        assert_eq!(states.normalize("   "), None);
        assert_eq!(US_STATES.len(), 51);
    }

    #[test]
    fn test_every_code_maps_in_any_case() {
        let states = StateNames::us();
        for (code, name) in US_STATES {
            assert_eq!(states.normalize(&code.to_lowercase()).as_deref(), Some(*name));
        }
    }

    #[test]
    fn test_alternate_state_table() {
        let states = StateNames::from_pairs([("on", "Ontario")]);
        assert_eq!(states.normalize("ON").as_deref(), Some("Ontario"));
        assert_eq!(states.normalize("tx").as_deref(), Some("tx"));
    }

    #[test]
    fn test_local_search_text() {
        let b = builder();
        assert_eq!(
            b.local_search_text(Some("Austin"), Some("tx")),
            "\"Austin\" OR \"Texas\""
        );
        assert_eq!(b.local_search_text(Some(" Austin "), None), "\"Austin\"");
        assert_eq!(b.local_search_text(None, Some("NY")), "\"New York\" local news");
        assert_eq!(b.local_search_text(Some(""), Some(" ")), "local news");
        assert_eq!(b.local_search_text(None, None), "local news");
    }

    #[test]
    fn test_local_news_free_text() {
        let query = builder().local_news(&local(json!({"city": "Austin", "state": "tx"})));
        let LocalQuery::FreeText(spec) = query else {
            panic!("expected free-text query");
        };
        assert_eq!(spec.path, "/api/search");
        assert_eq!(spec.params["q"], "\"Austin\" OR \"Texas\"");
        assert_eq!(spec.params["lang"], "en");
        assert!(spec.body.is_none());

        let LocalQuery::FreeText(spec) = builder().local_news(&local(json!({}))) else {
            panic!("expected free-text query");
        };
        assert_eq!(spec.params["q"], "local news");
    }

    #[test]
    fn test_local_news_coordinates() {
        let query =
            builder().local_news(&local(json!({"lat": 30.25, "lon": "-97.75", "city": "Austin"})));
        let LocalQuery::Coordinates(spec) = query else {
            panic!("expected coordinate query");
        };
        let body = spec.body.as_ref().unwrap();
        assert_eq!(spec.path, "/api/search_by_location");
        assert_eq!(spec.method(), hyper::Method::POST);
        assert_eq!(body["lat"], json!(30.25));
        assert_eq!(body["lon"], json!(-97.75));
        assert_eq!(body["radius"], json!(50.0));

        let query = builder().local_news(&local(json!({"lat": 1, "lon": 2, "radius_km": 10})));
        let LocalQuery::Coordinates(spec) = query else {
            panic!("expected coordinate query");
        };
        assert_eq!(spec.body.as_ref().unwrap()["radius"], json!(10.0));
    }

    #[test]
    fn test_breaking_and_headlines() {
        let input = BreakingNewsInput::from_query(
            &[("countries".to_string(), "us,ca".to_string())]
                .into_iter()
                .collect(),
            &PaginationConfig::default(),
        );
        let b = builder();

        let breaking = b.breaking_news(&input);
        assert_eq!(breaking.path, "/api/breaking_news");
        assert_eq!(breaking.params["countries"], "CA,US");
        assert_eq!(breaking.params["lang"], "en");

        let headlines = b.latest_headlines(&input);
        assert_eq!(headlines.path, "/api/latest_headlines");
        assert_eq!(headlines.params["page_size"], "10");
        assert_eq!(headlines.params["page"], "1");
    }
}
