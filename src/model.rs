// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Request parameters and upstream payload shapes.
//!
//! Upstream payloads are only partially typed: the fields the gateway acts on
//! are modeled explicitly, everything else is carried through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Catalog classifier used by search filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectType {
    All,
    Movies,
    TvSeries,
    Music,
    /// A code the gateway does not know; forwarded and filtered on as-is.
    Other(i64),
}

impl SubjectType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SubjectType::All,
            1 => SubjectType::Movies,
            2 => SubjectType::TvSeries,
            6 => SubjectType::Music,
            other => SubjectType::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            SubjectType::All => 0,
            SubjectType::Movies => 1,
            SubjectType::TvSeries => 2,
            SubjectType::Music => 6,
            SubjectType::Other(code) => code,
        }
    }
}

/// Reads the leading integer of `raw`. Missing, unparsable and zero values
/// all resolve to `default`.
pub fn lenient_int(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };

    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<i64>() {
        Ok(0) | Err(_) => default,
        Ok(value) if negative => -value,
        Ok(value) => value,
    }
}

/// Raw query string pairs in request order.
pub type QueryPairs = Vec<(String, String)>;

/// First value given for `key`. Later repeats of the same key are ignored.
fn first_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

#[derive(Debug, Default)]
pub struct TrendingQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl TrendingQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            page: first_value(pairs, "page"),
            per_page: first_value(pairs, "perPage"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub subject_type: Option<String>,
}

impl SearchQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            page: first_value(pairs, "page"),
            per_page: first_value(pairs, "perPage"),
            subject_type: first_value(pairs, "type"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SourcesQuery {
    pub season: Option<String>,
    pub episode: Option<String>,
}

impl SourcesQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            season: first_value(pairs, "season"),
            episode: first_value(pairs, "episode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingParams {
    pub page: i64,
    pub per_page: i64,
}

impl Default for TrendingParams {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 18,
        }
    }
}

impl From<&TrendingQuery> for TrendingParams {
    fn from(query: &TrendingQuery) -> Self {
        let defaults = Self::default();
        Self {
            page: lenient_int(query.page.as_deref(), defaults.page),
            per_page: lenient_int(query.per_page.as_deref(), defaults.per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub keyword: String,
    pub page: i64,
    pub per_page: i64,
    pub subject_type: SubjectType,
}

impl SearchParams {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            page: 1,
            per_page: 24,
            subject_type: SubjectType::All,
        }
    }

    pub fn from_query(keyword: impl Into<String>, query: &SearchQuery) -> Self {
        let defaults = Self::new(keyword);
        Self {
            page: lenient_int(query.page.as_deref(), defaults.page),
            per_page: lenient_int(query.per_page.as_deref(), defaults.per_page),
            subject_type: SubjectType::from_code(lenient_int(
                query.subject_type.as_deref(),
                SubjectType::All.code(),
            )),
            keyword: defaults.keyword,
        }
    }

    /// Body of the upstream search call.
    pub fn to_body(&self) -> Value {
        json!({
            "keyword": self.keyword,
            "page": self.page,
            "perPage": self.per_page,
            "subjectType": self.subject_type.code(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesParams {
    pub subject_id: String,
    /// Movies use season 0.
    pub season: i64,
    /// Movies use episode 0.
    pub episode: i64,
}

impl SourcesParams {
    pub fn from_query(subject_id: impl Into<String>, query: &SourcesQuery) -> Self {
        Self {
            subject_id: subject_id.into(),
            season: lenient_int(query.season.as_deref(), 0),
            episode: lenient_int(query.episode.as_deref(), 0),
        }
    }
}

/// The two body shapes the upstream answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEnvelope {
    /// `{ "data": <payload>, ... }` with a non-null `data`.
    Enveloped(Value),
    /// Anything else, taken as the payload itself.
    Raw(Value),
}

impl UpstreamEnvelope {
    pub fn from_body(mut body: Value) -> Self {
        let enveloped = body.get("data").is_some_and(|data| !data.is_null());
        if enveloped {
            if let Some(data) = body.get_mut("data") {
                return Self::Enveloped(data.take());
            }
        }
        Self::Raw(body)
    }

    pub fn into_payload(self) -> Value {
        match self {
            Self::Enveloped(payload) | Self::Raw(payload) => payload,
        }
    }
}

/// Keep only the `items` entries whose `subjectType` equals `subject_type`.
/// Payloads without an `items` array are left exactly as received.
pub fn retain_subject_type(content: &mut Value, subject_type: SubjectType) {
    let wanted = subject_type.code();
    let Some(items) = content.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };
    items.retain(|item| item.get("subjectType").and_then(Value::as_i64) == Some(wanted));
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailPayload {
    #[serde(default)]
    pub subject: Option<SubjectDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubjectDetail {
    #[serde(default, rename = "detailPath")]
    pub detail_path: Option<String>,
}

impl DetailPayload {
    /// Non-empty `subject.detailPath`, if the payload carries one.
    pub fn detail_path(payload: &Value) -> Option<String> {
        let detail = DetailPayload::deserialize(payload).ok()?;
        detail
            .subject?
            .detail_path
            .filter(|path| !path.is_empty())
    }
}

/// One `mediaFileList` entry with display defaults filled in.
///
/// `url` and `size` are copied as given: a `null` stays `null`, an absent key
/// stays absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedSource {
    pub quality: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    pub format: Value,
}

impl ProcessedSource {
    pub fn from_file(file: &Value) -> Self {
        let field = |name: &str| file.get(name).cloned();
        Self {
            quality: present(field("quality")).unwrap_or_else(|| Value::from("Unknown")),
            url: field("url"),
            size: field("size"),
            format: present(field("format")).unwrap_or_else(|| Value::from("mp4")),
        }
    }
}

/// Drops values the upstream uses to mean "not set".
fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Success envelope returned by every catalog endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Banner {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub upstream_host: String,
    pub session_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_initialized_at: Option<DateTime<Utc>>,
    pub session_cookies: usize,
    pub cookie_jar_populated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_int_follows_leading_digits_and_defaults() {
        assert_eq!(lenient_int(None, 18), 18);
        assert_eq!(lenient_int(Some(""), 18), 18);
        assert_eq!(lenient_int(Some("abc"), 18), 18);
        assert_eq!(lenient_int(Some("0"), 18), 18);
        assert_eq!(lenient_int(Some("12abc"), 18), 12);
        assert_eq!(lenient_int(Some("  7"), 18), 7);
        assert_eq!(lenient_int(Some("-3"), 0), -3);
    }

    #[test]
    fn trending_defaults_to_first_page_of_eighteen() {
        let params = TrendingParams::from(&TrendingQuery::default());
        assert_eq!(params, TrendingParams { page: 0, per_page: 18 });
    }

    #[test]
    fn search_params_serialize_in_upstream_shape() {
        let query = SearchQuery {
            page: None,
            per_page: Some("10".into()),
            subject_type: Some("2".into()),
        };
        let params = SearchParams::from_query("matrix", &query);
        assert_eq!(
            params.to_body(),
            json!({"keyword": "matrix", "page": 1, "perPage": 10, "subjectType": 2})
        );
    }

    #[test]
    fn subject_type_keeps_unknown_codes() {
        assert_eq!(SubjectType::from_code(6), SubjectType::Music);
        assert_eq!(SubjectType::from_code(9).code(), 9);
    }

    #[test]
    fn envelope_prefers_data_field() {
        let body = json!({"code": 0, "data": {"items": []}});
        assert_eq!(
            UpstreamEnvelope::from_body(body),
            UpstreamEnvelope::Enveloped(json!({"items": []}))
        );
    }

    #[test]
    fn envelope_passes_raw_body_through() {
        let body = json!({"items": [1, 2]});
        assert_eq!(
            UpstreamEnvelope::from_body(body.clone()).into_payload(),
            body
        );

        let null_data = json!({"code": 1, "data": null});
        assert_eq!(
            UpstreamEnvelope::from_body(null_data.clone()),
            UpstreamEnvelope::Raw(null_data)
        );
    }

    #[test]
    fn subject_filter_keeps_matching_items_and_other_fields() {
        let mut payload = json!({
            "pager": {"page": 1},
            "items": [
                {"title": "A", "subjectType": 1, "cover": null},
                {"title": "B", "subjectType": 2},
                {"title": "C", "subjectType": "1"},
                {"title": "D", "subjectType": null}
            ]
        });
        retain_subject_type(&mut payload, SubjectType::Movies);

        assert_eq!(
            payload,
            json!({
                "pager": {"page": 1},
                "items": [{"title": "A", "subjectType": 1, "cover": null}]
            })
        );
    }

    #[test]
    fn subject_filter_leaves_null_items_untouched() {
        let mut payload = json!({"items": null, "pager": 1});
        retain_subject_type(&mut payload, SubjectType::Movies);
        assert_eq!(payload, json!({"items": null, "pager": 1}));
    }

    #[test]
    fn repeated_query_keys_keep_the_first_value() {
        let pairs: QueryPairs = vec![
            ("page".into(), "1".into()),
            ("page".into(), "2".into()),
            ("perPage".into(), "5".into()),
        ];
        let params = TrendingParams::from(&TrendingQuery::from_pairs(&pairs));
        assert_eq!(params, TrendingParams { page: 1, per_page: 5 });

        let query = SourcesQuery::from_pairs(&[(String::from("episode"), String::from("3"))]);
        assert_eq!(query.season, None);
        assert_eq!(query.episode.as_deref(), Some("3"));
    }

    #[test]
    fn detail_path_requires_non_empty_string() {
        assert_eq!(
            DetailPayload::detail_path(&json!({"subject": {"detailPath": "x-1"}})),
            Some("x-1".to_string())
        );
        assert_eq!(DetailPayload::detail_path(&json!({"subject": {"detailPath": ""}})), None);
        assert_eq!(DetailPayload::detail_path(&json!({"subject": {}})), None);
        assert_eq!(DetailPayload::detail_path(&json!(null)), None);
    }

    #[test]
    fn processed_source_fills_missing_quality_and_format() {
        let source = ProcessedSource::from_file(&json!({"url": "https://cdn/x.mp4", "size": "1024"}));
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"quality": "Unknown", "url": "https://cdn/x.mp4", "size": "1024", "format": "mp4"})
        );

        let source = ProcessedSource::from_file(&json!({"quality": "", "format": "mkv", "resolution": 720}));
        assert_eq!(source.quality, json!("Unknown"));
        assert_eq!(source.format, json!("mkv"));
        assert_eq!(source.url, None);
    }

    #[test]
    fn processed_source_keeps_explicit_nulls() {
        let source = ProcessedSource::from_file(&json!({"url": null, "size": null}));
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"quality": "Unknown", "url": null, "size": null, "format": "mp4"})
        );
    }
}
