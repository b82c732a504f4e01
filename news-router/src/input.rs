//! Normalization of loosely-typed client input.
//!
//! Clients send numbers as strings, use several spellings for the same field
//! and sometimes send nothing at all. Everything is resolved here, once, into
//! strongly-typed inputs. Alias precedence (first present wins):
//!
//! | field     | local-news body                  | breaking-news query             |
//! |-----------|----------------------------------|---------------------------------|
//! | page size | `page_size`, `pageSize`          | `page_size`, `pageSize`         |
//! | language  | `lang`, `language`               | `lang`, `language`, `languages` |
//! | latitude  | `lat`, `latitude`                |                                 |
//! | longitude | `lon`, `lng`, `longitude`        |                                 |
//! | radius    | `radius_km`, `radius`            |                                 |
//! | countries |                                  | `countries`, `country`          |

use crate::config::PaginationConfig;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_COUNTRY: &str = "US";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// Page must be a positive finite number (fractions are truncated),
    /// otherwise 1. A numeric page size is clamped into the configured range,
    /// anything else takes the default.
    pub fn resolve(
        page: Option<&Value>,
        page_size: Option<&Value>,
        bounds: &PaginationConfig,
    ) -> Self {
        let page = page
            .and_then(as_number)
            .map(f64::trunc)
            .filter(|p| *p >= 1.0)
            .map(|p| p.min(f64::from(u32::MAX)) as u32)
            .unwrap_or(1);

        let page_size = page_size
            .and_then(as_number)
            .map(|size| {
                size.trunc().clamp(
                    f64::from(bounds.min_page_size),
                    f64::from(bounds.max_page_size),
                ) as u32
            })
            .unwrap_or(bounds.default_page_size);

        Self { page, page_size }
    }
}

/// Interprets JSON numbers and numeric strings; rejects non-finite values.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Non-empty trimmed string value.
pub fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// First entry of a comma-separated language list, lowercased.
pub fn first_language(raw: &str) -> Option<String> {
    raw.split(',')
        .map(str::trim)
        .find(|lang| !lang.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Comma-separated country codes, trimmed and uppercased.
pub fn country_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

fn first_present<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| !value.is_null())
}

fn first_param<'a>(params: &'a IndexMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalNewsInput {
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub language: String,
    pub pagination: Pagination,
}

impl LocalNewsInput {
    pub fn from_body(body: &Map<String, Value>, bounds: &PaginationConfig) -> Self {
        Self {
            city: first_present(body, &["city"]).and_then(as_text),
            state: first_present(body, &["state"]).and_then(as_text),
            latitude: first_present(body, &["lat", "latitude"]).and_then(as_number),
            longitude: first_present(body, &["lon", "lng", "longitude"]).and_then(as_number),
            radius_km: first_present(body, &["radius_km", "radius"])
                .and_then(as_number)
                .filter(|radius| *radius > 0.0),
            language: first_present(body, &["lang", "language"])
                .and_then(as_text)
                .and_then(|raw| first_language(&raw))
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            pagination: Pagination::resolve(
                first_present(body, &["page"]),
                first_present(body, &["page_size", "pageSize"]),
                bounds,
            ),
        }
    }

    /// Both coordinates are usable finite numbers.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BreakingNewsInput {
    pub countries: BTreeSet<String>,
    pub language: String,
    pub pagination: Pagination,
}

impl BreakingNewsInput {
    pub fn from_query(params: &IndexMap<String, String>, bounds: &PaginationConfig) -> Self {
        let mut countries = first_param(params, &["countries", "country"])
            .map(country_set)
            .unwrap_or_default();
        if countries.is_empty() {
            countries.insert(DEFAULT_COUNTRY.to_string());
        }

        let language = first_param(params, &["lang", "language", "languages"])
            .and_then(first_language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let page = params.get("page").map(|p| Value::String(p.clone()));
        let page_size = first_param(params, &["page_size", "pageSize"])
            .map(|p| Value::String(p.to_string()));

        Self {
            countries,
            language,
            pagination: Pagination::resolve(page.as_ref(), page_size.as_ref(), bounds),
        }
    }

    /// Countries joined the way the upstream expects them.
    pub fn countries_param(&self) -> String {
        self.countries.iter().cloned().collect::<Vec<_>>().join(",")
    }
}
