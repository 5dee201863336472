// Copyright 2025 Memophor Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP API handlers for the MovieBox gateway.
//!
//! This module implements the public REST surface:
//!
//! - `GET /` - Service banner
//! - `GET /api/homepage` - Homepage content
//! - `GET /api/trending` - Trending movies and TV series
//! - `GET /api/search/:query` - Search the catalog
//! - `GET /api/info/:movieId` - Subject details
//! - `GET /api/sources/:movieId` - Download sources for a subject
//! - `GET /healthz` - Service health and session state
//! - `GET /metrics` - Prometheus metrics export
//!
//! Catalog responses use the `{status, data}` envelope; failures are
//! translated by [`AppError`].

use std::any::Any;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::config::UpstreamConfig;
use crate::error::{AppError, Endpoint};
use crate::forwarder::Forwarder;
use crate::metrics::Metrics;
use crate::model::{
    ApiResponse, Banner, HealthResponse, QueryPairs, SearchParams, SearchQuery, SourcesParams,
    SourcesQuery, TrendingParams, TrendingQuery,
};
use crate::session::Session;
use crate::upstream::UpstreamClient;

const BANNER_ENDPOINTS: &[&str] = &[
    "GET /api/homepage - Get homepage content",
    "GET /api/trending - Get trending movies and TV series",
    "GET /api/search/:query - Search for movies and TV series",
    "GET /api/info/:movieId - Get detailed info about a movie/series",
    "GET /api/sources/:movieId - Get streaming sources for a movie/series",
];

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire the upstream client, session and catalog for one mirror.
    pub fn try_new(upstream: UpstreamConfig) -> anyhow::Result<Self> {
        let metrics = Metrics::new()?;
        let client = UpstreamClient::try_new(upstream, metrics.clone())?;
        let session = Session::new(client.clone(), metrics.clone());
        let catalog = Catalog::new(Forwarder::new(client, session));

        Ok(Self { catalog, metrics })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner).fallback(not_found))
        .route("/api/homepage", get(homepage).fallback(not_found))
        .route("/api/trending", get(trending).fallback(not_found))
        .route("/api/search/:query", get(search).fallback(not_found))
        .route("/api/info/:movie_id", get(info).fallback(not_found))
        .route("/api/sources/:movie_id", get(sources).fallback(not_found))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors())
        .with_state(state)
}

/// The CORS layer answers every `OPTIONS` request itself with a 200.
fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    };

    AppError::Internal(anyhow::anyhow!(message)).into_response()
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Service banner
pub async fn banner() -> Json<Banner> {
    Json(Banner {
        status: "success",
        message: "MovieBox API Server is running",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: BANNER_ENDPOINTS,
    })
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let forwarder = state.catalog.forwarder();
    let session = forwarder.session().current().await;

    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        upstream_host: forwarder.config().host.clone(),
        session_initialized: session.is_some(),
        session_initialized_at: session.as_ref().map(|info| info.initialized_at),
        session_cookies: session.as_ref().map_or(0, |info| info.cookies.len()),
        cookie_jar_populated: forwarder.has_cookies(),
    })
}

/// Metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state.metrics.export()
}

type CatalogResult = Result<Json<ApiResponse<Value>>, AppError>;

type PathParam = Result<Path<String>, PathRejection>;
type QueryParams = Result<Query<QueryPairs>, QueryRejection>;

fn respond(endpoint: Endpoint, result: Result<Value, crate::error::ProxyError>) -> CatalogResult {
    result
        .map(|data| Json(ApiResponse::success(data)))
        .map_err(|source| AppError::endpoint(endpoint, source))
}

/// Query pairs in request order. An unreadable query string counts as empty.
fn query_pairs(query: QueryParams) -> QueryPairs {
    query.map(|Query(pairs)| pairs).unwrap_or_default()
}

/// Homepage content
pub async fn homepage(State(state): State<AppState>) -> CatalogResult {
    state.metrics.record_request(Endpoint::Homepage.name());
    respond(Endpoint::Homepage, state.catalog.homepage().await)
}

/// Trending movies and TV series
pub async fn trending(State(state): State<AppState>, query: QueryParams) -> CatalogResult {
    state.metrics.record_request(Endpoint::Trending.name());
    let query = TrendingQuery::from_pairs(&query_pairs(query));
    let params = TrendingParams::from(&query);
    respond(Endpoint::Trending, state.catalog.trending(params).await)
}

/// Search movies and TV series
pub async fn search(
    State(state): State<AppState>,
    keyword: PathParam,
    query: QueryParams,
) -> CatalogResult {
    state.metrics.record_request(Endpoint::Search.name());
    let Path(keyword) = keyword?;
    let query = SearchQuery::from_pairs(&query_pairs(query));
    let params = SearchParams::from_query(keyword, &query);
    respond(Endpoint::Search, state.catalog.search(params).await)
}

/// Detailed information about a movie or series
pub async fn info(State(state): State<AppState>, movie_id: PathParam) -> CatalogResult {
    state.metrics.record_request(Endpoint::Info.name());
    let Path(movie_id) = movie_id?;
    respond(Endpoint::Info, state.catalog.detail(&movie_id).await)
}

/// Streaming sources for a movie or series
pub async fn sources(
    State(state): State<AppState>,
    movie_id: PathParam,
    query: QueryParams,
) -> CatalogResult {
    state.metrics.record_request(Endpoint::Sources.name());
    let Path(movie_id) = movie_id?;
    let query = SourcesQuery::from_pairs(&query_pairs(query));
    let params = SourcesParams::from_query(movie_id, &query);
    respond(Endpoint::Sources, state.catalog.sources(params).await)
}
