// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Session bootstrap for the upstream catalog.
//!
//! The upstream only answers catalog calls once the client holds the cookies
//! handed out by its app-package endpoint. [`Session::ensure`] performs that
//! handshake once and lets every later caller reuse it.
//!
//! Callers arriving while a handshake is in flight wait on that same call
//! instead of starting their own. A failed handshake is reported to every
//! waiter and then forgotten, so the next call starts a fresh attempt.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::SET_COOKIE;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ProxyError;
use crate::metrics::Metrics;
use crate::model::UpstreamEnvelope;
use crate::upstream::{RequestOptions, UpstreamClient};

const BOOTSTRAP_PATH: &str = "/app/get-latest-app-pkgs";

/// Outcome of a successful handshake.
#[derive(Debug)]
pub struct SessionInfo {
    /// Unwrapped app-package payload. Kept for diagnostics only.
    pub app_info: Value,
    /// Raw `Set-Cookie` values received with the handshake.
    pub cookies: Vec<String>,
    pub initialized_at: DateTime<Utc>,
}

type Bootstrap = Shared<BoxFuture<'static, Result<Arc<SessionInfo>, ProxyError>>>;

enum Slot {
    Empty,
    Pending(Bootstrap),
    Ready(Arc<SessionInfo>),
}

#[derive(Clone)]
pub struct Session {
    client: UpstreamClient,
    metrics: Metrics,
    slot: Arc<Mutex<Slot>>,
}

impl Session {
    pub fn new(client: UpstreamClient, metrics: Metrics) -> Self {
        Self {
            client,
            metrics,
            slot: Arc::new(Mutex::new(Slot::Empty)),
        }
    }

    /// Make sure the handshake has completed, performing it if needed.
    pub async fn ensure(&self) -> Result<Arc<SessionInfo>, ProxyError> {
        let pending = {
            let mut slot = self.slot.lock().await;

            // A finished attempt can be left pending when every caller that
            // awaited it was dropped before settling the slot.
            let finished = match &*slot {
                Slot::Pending(attempt) => attempt.peek().cloned(),
                Slot::Empty | Slot::Ready(_) => None,
            };
            match finished {
                Some(Ok(info)) => *slot = Slot::Ready(info),
                Some(Err(_)) => *slot = Slot::Empty,
                None => {}
            }

            match &*slot {
                Slot::Ready(info) => return Ok(Arc::clone(info)),
                Slot::Pending(attempt) => attempt.clone(),
                Slot::Empty => {
                    let attempt =
                        bootstrap(self.client.clone(), self.metrics.clone()).boxed().shared();
                    *slot = Slot::Pending(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = pending.clone().await;

        let mut slot = self.slot.lock().await;
        if let Slot::Pending(current) = &*slot {
            // Another caller may already have settled this attempt and a newer
            // one may be pending; only settle the attempt we waited on.
            if Shared::ptr_eq(current, &pending) {
                *slot = match &outcome {
                    Ok(info) => Slot::Ready(Arc::clone(info)),
                    Err(_) => Slot::Empty,
                };
            }
        }

        outcome
    }

    /// Completed session, if any. Never triggers a handshake.
    pub async fn current(&self) -> Option<Arc<SessionInfo>> {
        match &*self.slot.lock().await {
            Slot::Ready(info) => Some(Arc::clone(info)),
            Slot::Empty | Slot::Pending(_) => None,
        }
    }
}

async fn bootstrap(
    client: UpstreamClient,
    metrics: Metrics,
) -> Result<Arc<SessionInfo>, ProxyError> {
    let config = client.config();
    tracing::info!(host = %config.host, "initializing session cookies");
    metrics.record_session_bootstrap();

    let url = config.api_url(BOOTSTRAP_PATH);
    let options = RequestOptions {
        headers: client.default_headers().clone(),
        ..RequestOptions::get().param("app_name", &config.app_name)
    };

    let response = match client.execute(&url, options).await {
        Ok(response) => response,
        Err(error) => {
            metrics.record_session_bootstrap_failure();
            tracing::error!(%error, "failed to get app info");
            return Err(error);
        }
    };

    let cookies: Vec<String> = response
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect();

    tracing::info!(cookies = cookies.len(), "session cookies initialized");
    if !cookies.is_empty() {
        tracing::debug!(?cookies, "received cookies");
    }

    Ok(Arc::new(SessionInfo {
        app_info: UpstreamEnvelope::from_body(response.body).into_payload(),
        cookies,
        initialized_at: Utc::now(),
    }))
}
