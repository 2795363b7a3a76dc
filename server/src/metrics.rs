//! # Prometheus Metrics
//!
//! Operational metrics for the credit ledger and its integrations, scraped
//! at `/metrics` on the dedicated metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `grantees` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the server.
///
/// Prometheus handles are reference-counted internally, so clones share
/// the same underlying series.
#[derive(Clone)]
pub struct ServerMetrics {
    registry: Registry,
    /// Credits debited by successful spends.
    pub credits_consumed_total: IntCounter,
    /// Credits added by successful purchases.
    pub credits_purchased_total: IntCounter,
    /// Spends refused for lack of credits.
    pub consume_rejections_total: IntCounter,
    pub purchases_total: IntCounter,
    pub signups_total: IntCounter,
    pub emails_sent_total: IntCounter,
    pub email_failures_total: IntCounter,
    /// Latency of the credit and email functions, labelled by function name.
    pub request_latency_seconds: HistogramVec,
}

impl ServerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("grantees".into()), None)
            .expect("failed to create prometheus registry");

        let credits_consumed_total = register(
            &registry,
            IntCounter::new("credits_consumed_total", "Total credits spent")
                .expect("metric creation"),
        );
        let credits_purchased_total = register(
            &registry,
            IntCounter::new("credits_purchased_total", "Total credits bought")
                .expect("metric creation"),
        );
        let consume_rejections_total = register(
            &registry,
            IntCounter::new(
                "consume_rejections_total",
                "Spends rejected because the balance was too low",
            )
            .expect("metric creation"),
        );
        let purchases_total = register(
            &registry,
            IntCounter::new("purchases_total", "Credit packages purchased")
                .expect("metric creation"),
        );
        let signups_total = register(
            &registry,
            IntCounter::new("signups_total", "Accounts created").expect("metric creation"),
        );
        let emails_sent_total = register(
            &registry,
            IntCounter::new("emails_sent_total", "Emails accepted by the provider")
                .expect("metric creation"),
        );
        let email_failures_total = register(
            &registry,
            IntCounter::new("email_failures_total", "Emails that failed to send")
                .expect("metric creation"),
        );
        let request_latency_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "request_latency_seconds",
                    "Latency of credit and email functions in seconds",
                )
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
                &["function"],
            )
            .expect("metric creation"),
        );

        Self {
            registry,
            credits_consumed_total,
            credits_purchased_total,
            consume_rejections_total,
            purchases_total,
            signups_total,
            emails_sent_total,
            email_failures_total,
            request_latency_seconds,
        }
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

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric registration");
    collector
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<ServerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
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
