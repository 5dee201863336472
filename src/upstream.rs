// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the MovieBox catalog.
//!
//! Every call goes through one shared cookie jar, so cookies handed out by the
//! session bootstrap are replayed on all later calls to the same mirror.

use std::sync::Arc;

use anyhow::Context;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, HOST, REFERER, USER_AGENT,
};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use tokio::time::Instant;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::metrics::Metrics;

/// Per-call settings. Headers given here are layered over the defaults by the
/// forwarder; a header set here always wins over the default of the same name.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            params: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn post_json(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get()
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ProxyError> {
        let value = HeaderValue::from_str(value).map_err(|_| ProxyError::InvalidHeader {
            name: name.to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// Raw upstream answer with the body decoded as JSON when possible.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Overlay `overrides` on `defaults`. Names present in both take the override.
pub fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
        for value in overrides.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

/// HTTP client wrapper bound to a single mirror host.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    jar: Arc<Jar>,
    config: Arc<UpstreamConfig>,
    default_headers: HeaderMap,
    metrics: Metrics,
}

impl UpstreamClient {
    /// Construct a new upstream client using the provided configuration.
    pub fn try_new(config: UpstreamConfig, metrics: Metrics) -> anyhow::Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.timeout)
            .build()
            .context("Failed to build upstream client")?;
        let default_headers =
            default_headers(&config).context("Invalid default upstream headers")?;

        Ok(Self {
            client,
            jar,
            config: Arc::new(config),
            default_headers,
            metrics,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Whether the jar holds any cookie for the active mirror.
    pub fn has_cookies(&self) -> bool {
        Url::parse(&self.config.host_url)
            .ok()
            .and_then(|url| self.jar.cookies(&url))
            .is_some()
    }

    /// Issue one call exactly as described by `options`.
    pub async fn execute(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<UpstreamResponse, ProxyError> {
        let RequestOptions {
            method,
            params,
            body,
            headers,
        } = options;

        let mut request = self.client.request(method, url).headers(headers);
        if !params.is_empty() {
            request = request.query(&params);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        self.metrics.record_upstream_request();
        let start = Instant::now();
        let result = self.send(url, request).await;
        self.metrics
            .record_upstream_latency(start.elapsed().as_secs_f64());

        if result.is_err() {
            self.metrics.record_upstream_failure();
        }
        result
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<UpstreamResponse, ProxyError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(url, error = %e, "upstream request failed");
            ProxyError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url,
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or_default(),
                "upstream returned non-success status"
            );
            return Err(ProxyError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = response.headers().clone();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn default_headers(config: &UpstreamConfig) -> Result<HeaderMap, ProxyError> {
    let entries = [
        (
            HeaderName::from_static("x-client-info"),
            format!(r#"{{"timezone":"{}"}}"#, config.timezone),
        ),
        (ACCEPT_LANGUAGE, "en-US,en;q=0.5".to_string()),
        (ACCEPT, "application/json".to_string()),
        (USER_AGENT, config.user_agent.clone()),
        (REFERER, config.host_url.clone()),
        (HOST, config.host.clone()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let value = HeaderValue::from_str(&value).map_err(|_| ProxyError::InvalidHeader {
            name: name.to_string(),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UpstreamClient {
        UpstreamClient::try_new(UpstreamConfig::new(server.uri()), Metrics::new().unwrap())
            .expect("client")
    }

    #[test]
    fn defaults_carry_mirror_identity() {
        let cfg = UpstreamConfig::new("https://moviebox.pk");
        let headers = default_headers(&cfg).unwrap();
        assert_eq!(headers[HOST], "moviebox.pk");
        assert_eq!(headers[REFERER], "https://moviebox.pk");
        assert_eq!(headers["x-client-info"], r#"{"timezone":"Africa/Nairobi"}"#);
        assert_eq!(headers[ACCEPT], "application/json");
    }

    #[test]
    fn overrides_win_over_defaults() {
        let cfg = UpstreamConfig::new("https://moviebox.pk");
        let defaults = default_headers(&cfg).unwrap();
        let overrides = RequestOptions::get()
            .header(REFERER, "https://moviebox.pk/movies/x")
            .unwrap()
            .headers;

        let merged = merge_headers(&defaults, &overrides);
        assert_eq!(merged[REFERER], "https://moviebox.pk/movies/x");
        assert_eq!(merged.get_all(REFERER).iter().count(), 1);
        assert_eq!(merged[HOST], "moviebox.pk");
        assert_eq!(merged.len(), defaults.len());
    }

    #[test]
    fn invalid_override_value_is_rejected() {
        let err = RequestOptions::get()
            .header(REFERER, "bad\nvalue")
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn execute_sends_params_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wefeed-h5-bff/web/subject/search"))
            .and(query_param("x", "1"))
            .and(header("accept", "application/json"))
            .and(body_json(json!({"keyword": "dune"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let url = client.config().api_url("/web/subject/search");
        let options = RequestOptions {
            headers: client.default_headers().clone(),
            ..RequestOptions::post_json(json!({"keyword": "dune"})).param("x", 1)
        };

        let response = client.execute(&url, options).await.expect("response");
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({"data": {"ok": true}}));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .execute(&client.config().api_url("/web/home"), RequestOptions::get())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Status { status: 403, .. }));
        assert_eq!(err.to_string(), "Request failed with status code 403");
    }

    #[tokio::test]
    async fn non_json_body_is_returned_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .execute(&client.config().api_url("/web/home"), RequestOptions::get())
            .await
            .expect("response");
        assert_eq!(response.body, json!("plain"));
    }
}
