use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Routes listed in the 404 body.
pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "GET /api/homepage",
    "GET /api/trending",
    "GET /api/search/:query",
    "GET /api/info/:movieId",
    "GET /api/sources/:movieId",
];

/// Failure talking to the upstream catalog.
///
/// Cloneable so a single failed session bootstrap can be handed to every
/// request that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Transport(#[source] Arc<reqwest::Error>),
    #[error("Request failed with status code {status}")]
    Status { status: u16, url: String },
    #[error("Invalid value for header {name}")]
    InvalidHeader { name: String },
    #[error("Could not get movie detail path for referer header")]
    MissingDetailPath,
}

impl From<reqwest::Error> for ProxyError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(Arc::new(error))
    }
}

/// Public operations, each with its own client-facing failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Homepage,
    Trending,
    Search,
    Info,
    Sources,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Homepage => "homepage",
            Endpoint::Trending => "trending",
            Endpoint::Search => "search",
            Endpoint::Info => "info",
            Endpoint::Sources => "sources",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Endpoint::Homepage => "Failed to fetch homepage content",
            Endpoint::Trending => "Failed to fetch trending content",
            Endpoint::Search => "Failed to search content",
            Endpoint::Info => "Failed to fetch movie/series info",
            Endpoint::Sources => "Failed to fetch streaming sources",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", .endpoint.failure_message())]
    Endpoint {
        endpoint: Endpoint,
        #[source]
        source: ProxyError,
    },
    #[error("Endpoint not found")]
    NotFound,
    #[error("Invalid request")]
    BadRequest(String),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(rename = "availableEndpoints", skip_serializing_if = "Option::is_none")]
    available_endpoints: Option<&'static [&'static str]>,
}

impl AppError {
    pub fn endpoint(endpoint: Endpoint, source: ProxyError) -> Self {
        Self::Endpoint { endpoint, source }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, available_endpoints) = match &self {
            AppError::Endpoint { endpoint, source } => {
                tracing::error!(endpoint = endpoint.name(), error = %source, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some(source.to_string()),
                    None,
                )
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                None,
                Some(AVAILABLE_ENDPOINTS),
            ),
            AppError::BadRequest(reason) => {
                tracing::warn!(%reason, "rejected request");
                (StatusCode::BAD_REQUEST, Some(reason.clone()), None)
            }
            AppError::Internal(cause) => {
                tracing::error!(error = %cause, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some(cause.to_string()),
                    None,
                )
            }
        };

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
            error,
            available_endpoints,
        };

        (status, Json(body)).into_response()
    }
}
