// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Generic "call the upstream" operation shared by every catalog endpoint.

use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::model::UpstreamEnvelope;
use crate::session::Session;
use crate::upstream::{merge_headers, RequestOptions, UpstreamClient};

#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    session: Session,
}

impl Forwarder {
    pub fn new(client: UpstreamClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn config(&self) -> &UpstreamConfig {
        self.client.config()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn has_cookies(&self) -> bool {
        self.client.has_cookies()
    }

    /// Issue one upstream call after the session is in place and return the
    /// payload with the upstream envelope removed.
    pub async fn forward(&self, url: &str, options: RequestOptions) -> Result<Value, ProxyError> {
        self.session.ensure().await?;

        let headers = merge_headers(self.client.default_headers(), &options.headers);
        let response = self
            .client
            .execute(url, RequestOptions { headers, ..options })
            .await?;

        Ok(UpstreamEnvelope::from_body(response.body).into_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use reqwest::header::REFERER;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_bootstrap(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/wefeed-h5-bff/app/get-latest-app-pkgs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "mb_token=abc123; Path=/")
                    .set_body_json(json!({"data": {}})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn forwarder_for(server: &MockServer) -> Forwarder {
        let metrics = Metrics::new().unwrap();
        let client = UpstreamClient::try_new(UpstreamConfig::new(server.uri()), metrics.clone())
            .expect("client");
        let session = Session::new(client.clone(), metrics);
        Forwarder::new(client, session)
    }

    #[tokio::test]
    async fn forward_replays_session_cookie_and_unwraps_data() {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("GET"))
            .and(path("/wefeed-h5-bff/web/home"))
            .and(header("cookie", "mb_token=abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 0, "data": {"banners": [1, 2]}})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server);
        let url = forwarder.config().api_url("/web/home");
        for _ in 0..2 {
            let payload = forwarder
                .forward(&url, RequestOptions::get())
                .await
                .expect("payload");
            assert_eq!(payload, json!({"banners": [1, 2]}));
        }
    }

    #[tokio::test]
    async fn per_call_header_overrides_default() {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("GET"))
            .and(path("/wefeed-h5-bff/web/subject/download"))
            .and(header("referer", "https://example.test/movies/dune"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"raw": true})))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server);
        let url = forwarder.config().api_url("/web/subject/download");
        let options = RequestOptions::get()
            .header(REFERER, "https://example.test/movies/dune")
            .unwrap();

        let payload = forwarder.forward(&url, options).await.expect("payload");
        assert_eq!(payload, json!({"raw": true}));
    }

    #[tokio::test]
    async fn failed_session_stops_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wefeed-h5-bff/app/get-latest-app-pkgs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wefeed-h5-bff/web/home"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server);
        let url = forwarder.config().api_url("/web/home");
        let err = forwarder
            .forward(&url, RequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status code 500");
    }
}
