//! # Prometheus Metrics
//!
//! Exposes operational metrics for the gateway. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use peridot_protocol::invocation::{ContractCall, ContractInvoker, InvocationResult};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Holds all Prometheus metric handles for the gateway.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct GatewayMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// HTTP operations served, by operation and outcome.
    pub requests_total: IntCounterVec,
    /// Contract invocations, by execution mode and outcome.
    pub invocations_total: IntCounterVec,
    /// Contract invocation latency in seconds, by execution mode.
    pub invocation_seconds: HistogramVec,
}

impl GatewayMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("peridot".into()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Gateway operations served"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let invocations_total = IntCounterVec::new(
            Opts::new("contract_invocations_total", "Contract invocations attempted"),
            &["mode", "outcome"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let invocation_seconds = HistogramVec::new(
            HistogramOpts::new(
                "contract_invocation_seconds",
                "Contract invocation latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["mode"],
        )?;
        registry.register(Box::new(invocation_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            invocations_total,
            invocation_seconds,
        })
    }

    /// Counts one served operation. `outcome` is `"ok"` or an error kind.
    pub fn record_request(&self, operation: &str, outcome: &str) {
        self.requests_total.with_label_values(&[operation, outcome]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<GatewayMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Instrumented invoker
// ---------------------------------------------------------------------------

/// Wraps a [`ContractInvoker`] and records count and latency of every call.
pub struct InstrumentedInvoker {
    inner: Arc<dyn ContractInvoker>,
    metrics: SharedMetrics,
}

impl InstrumentedInvoker {
    pub fn new(inner: Arc<dyn ContractInvoker>, metrics: SharedMetrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl ContractInvoker for InstrumentedInvoker {
    async fn invoke(&self, call: &ContractCall) -> peridot_protocol::Result<InvocationResult> {
        let mode = call.mode.as_str();
        let started = Instant::now();
        let result = self.inner.invoke(call).await;

        self.metrics
            .invocation_seconds
            .with_label_values(&[mode])
            .observe(started.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics
            .invocations_total
            .with_label_values(&[mode, outcome])
            .inc();
        result
    }

    fn strategy(&self) -> &'static str {
        self.inner.strategy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peridot_protocol::invocation::{NativeValue, StubInvoker};

    #[tokio::test]
    async fn instrumented_invoker_counts_outcomes() {
        let metrics = Arc::new(GatewayMetrics::new().unwrap());
        let stub = StubInvoker::new().with_value("get_total_deposited", NativeValue::Int(1));
        let invoker = InstrumentedInvoker::new(Arc::new(stub), metrics.clone());

        invoker
            .invoke(&ContractCall::simulate("C", "get_total_deposited"))
            .await
            .unwrap();
        invoker
            .invoke(&ContractCall::simulate("C", "missing"))
            .await
            .unwrap_err();

        assert_eq!(
            metrics.invocations_total.with_label_values(&["simulate", "ok"]).get(),
            1
        );
        assert_eq!(
            metrics
                .invocations_total
                .with_label_values(&["simulate", "execution"])
                .get(),
            1
        );
        assert_eq!(invoker.strategy(), "stub");
    }

    #[test]
    fn encodes_with_prefix() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_request("deposit", "ok");
        let text = metrics.encode().unwrap();
        assert!(text.contains("peridot_gateway_requests_total"));
    }
}
