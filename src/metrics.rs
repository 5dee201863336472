// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics collection for the gateway.
//!
//! Tracks upstream traffic and session bootstrap attempts.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

use crate::error::AppError;

/// Metrics collector for the gateway
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,

    // Inbound request metrics
    pub requests_total: IntCounterVec,

    // Upstream metrics
    pub upstream_requests: IntCounter,
    pub upstream_failures: IntCounter,
    pub upstream_latency: Histogram,

    // Session metrics
    pub session_bootstraps: IntCounter,
    pub session_bootstrap_failures: IntCounter,
}

fn metric_error(e: prometheus::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("Failed to create metric: {}", e))
}

impl Metrics {
    pub fn new() -> Result<Self, AppError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "moviebox_requests_total",
                "Total number of catalog requests by endpoint",
            ),
            &["endpoint"],
        )
        .map_err(metric_error)?;

        let upstream_requests = IntCounter::with_opts(Opts::new(
            "moviebox_upstream_requests_total",
            "Total number of calls issued to the upstream catalog",
        ))
        .map_err(metric_error)?;

        let upstream_failures = IntCounter::with_opts(Opts::new(
            "moviebox_upstream_failures_total",
            "Total number of upstream calls that failed or returned a non-2xx status",
        ))
        .map_err(metric_error)?;

        let upstream_latency = Histogram::with_opts(
            HistogramOpts::new(
                "moviebox_upstream_latency_seconds",
                "Duration of upstream calls in seconds",
            )
            .buckets(vec![
                0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.0, 5.0, 10.0, 30.0,
            ]),
        )
        .map_err(metric_error)?;

        let session_bootstraps = IntCounter::with_opts(Opts::new(
            "moviebox_session_bootstraps_total",
            "Total number of session bootstrap calls issued",
        ))
        .map_err(metric_error)?;

        let session_bootstrap_failures = IntCounter::with_opts(Opts::new(
            "moviebox_session_bootstrap_failures_total",
            "Total number of session bootstrap calls that failed",
        ))
        .map_err(metric_error)?;

        let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
            Box::new(requests_total.clone()),
            Box::new(upstream_requests.clone()),
            Box::new(upstream_failures.clone()),
            Box::new(upstream_latency.clone()),
            Box::new(session_bootstraps.clone()),
            Box::new(session_bootstrap_failures.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to register metric: {}", e))
            })?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            upstream_requests,
            upstream_failures,
            upstream_latency,
            session_bootstraps,
            session_bootstrap_failures,
        })
    }

    /// Record an inbound catalog request
    pub fn record_request(&self, endpoint: &str) {
        self.requests_total.with_label_values(&[endpoint]).inc();
    }

    /// Record an upstream call
    pub fn record_upstream_request(&self) {
        self.upstream_requests.inc();
    }

    /// Record an upstream failure
    pub fn record_upstream_failure(&self) {
        self.upstream_failures.inc();
    }

    /// Observe latency for an upstream call in seconds
    pub fn record_upstream_latency(&self, seconds: f64) {
        self.upstream_latency.observe(seconds);
    }

    pub fn record_session_bootstrap(&self) {
        self.session_bootstraps.inc();
    }

    pub fn record_session_bootstrap_failure(&self) {
        self.session_bootstrap_failures.inc();
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String, AppError> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to convert metrics to string: {}",
                e
            ))
        })
    }
}
