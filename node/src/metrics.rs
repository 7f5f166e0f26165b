//! # Prometheus Metrics
//!
//! Operational metrics for the hub node, scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `knowhub` prefix so they do not collide with any default global
//! registry consumers.
//!
//! Counters are driven by the notifications a committed operation emits, so
//! they only ever count work that actually landed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

use knowhub_contracts::events::{Event, HubEvent};
use knowhub_protocol::config::ONE_TOKEN;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared between the service and the metrics endpoint.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Entries registered.
    pub entries_submitted_total: IntCounter,
    /// Votes recorded, either direction.
    pub votes_cast_total: IntCounter,
    pub upvotes_total: IntCounter,
    pub downvotes_total: IntCounter,
    /// Upvote rewards paid out of the pool.
    pub rewards_paid_total: IntCounter,
    /// Upvotes that landed without a reward because the pool was short.
    pub rewards_skipped_total: IntCounter,
    /// Operations that failed validation or could not be persisted.
    pub rejected_operations_total: IntCounter,
    /// Current reward pool, in whole tokens.
    pub reward_pool_tokens: Gauge,
    /// Entries registered so far.
    pub entry_count: IntGauge,
    /// Wall-clock time of a mutating operation, commit included.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("knowhub".into()), None)
            .expect("failed to create prometheus registry");

        let entries_submitted_total =
            IntCounter::new("entries_submitted_total", "Total number of entries submitted")
                .expect("metric creation");
        registry
            .register(Box::new(entries_submitted_total.clone()))
            .expect("metric registration");

        let votes_cast_total =
            IntCounter::new("votes_cast_total", "Total number of votes recorded")
                .expect("metric creation");
        registry
            .register(Box::new(votes_cast_total.clone()))
            .expect("metric registration");

        let upvotes_total = IntCounter::new("upvotes_total", "Total number of upvotes recorded")
            .expect("metric creation");
        registry
            .register(Box::new(upvotes_total.clone()))
            .expect("metric registration");

        let downvotes_total =
            IntCounter::new("downvotes_total", "Total number of downvotes recorded")
                .expect("metric creation");
        registry
            .register(Box::new(downvotes_total.clone()))
            .expect("metric registration");

        let rewards_paid_total = IntCounter::new(
            "rewards_paid_total",
            "Total number of upvote rewards paid from the pool",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rewards_paid_total.clone()))
            .expect("metric registration");

        let rewards_skipped_total = IntCounter::new(
            "rewards_skipped_total",
            "Total number of upvotes recorded without a reward",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rewards_skipped_total.clone()))
            .expect("metric registration");

        let rejected_operations_total = IntCounter::new(
            "rejected_operations_total",
            "Total number of operations rejected without a state change",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejected_operations_total.clone()))
            .expect("metric registration");

        let reward_pool_tokens =
            Gauge::new("reward_pool_tokens", "Current reward pool balance in whole tokens")
                .expect("metric creation");
        registry
            .register(Box::new(reward_pool_tokens.clone()))
            .expect("metric registration");

        let entry_count = IntGauge::new("entry_count", "Number of entries in the hub")
            .expect("metric creation");
        registry
            .register(Box::new(entry_count.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of mutating operations including the snapshot commit",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            entries_submitted_total,
            votes_cast_total,
            upvotes_total,
            downvotes_total,
            rewards_paid_total,
            rewards_skipped_total,
            rejected_operations_total,
            reward_pool_tokens,
            entry_count,
            operation_latency_seconds,
        }
    }

    /// Updates counters from the notifications of one committed operation.
    ///
    /// A skipped reward leaves no notification of its own, so it is counted
    /// as an upvote without a matching `RewardDistributed`.
    pub fn record_events(&self, events: &[Event]) {
        let mut upvotes = 0u64;
        let mut rewards = 0u64;

        for event in events {
            let Event::Hub(event) = event else { continue };
            match event {
                HubEvent::EntrySubmitted { .. } => self.entries_submitted_total.inc(),
                HubEvent::EntryVoted { is_upvote, .. } => {
                    self.votes_cast_total.inc();
                    if *is_upvote {
                        upvotes += 1;
                        self.upvotes_total.inc();
                    } else {
                        self.downvotes_total.inc();
                    }
                }
                HubEvent::RewardDistributed { .. } => {
                    rewards += 1;
                    self.rewards_paid_total.inc();
                }
            }
        }

        self.rewards_skipped_total
            .inc_by(upvotes.saturating_sub(rewards));
    }

    /// Refreshes the state gauges after a commit.
    pub fn set_state(&self, pool_balance: u128, entry_count: usize) {
        self.reward_pool_tokens
            .set(pool_balance as f64 / ONE_TOKEN as f64);
        self.entry_count.set(entry_count as i64);
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

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed to the service and the metrics router.
pub type SharedMetrics = Arc<NodeMetrics>;

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
