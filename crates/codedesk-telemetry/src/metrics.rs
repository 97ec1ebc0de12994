//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Labels are closed enums so call sites cannot invent new series.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// How a page fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResultLabel {
    /// The page was applied to state.
    Applied,
    /// A newer request superseded this one.
    Superseded,
    /// The remote call failed.
    Failed,
}

impl FetchResultLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        }
    }
}

/// How an action execution settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResultLabel {
    /// Every item committed.
    Succeeded,
    /// The call succeeded but some items failed.
    Partial,
    /// The call itself failed.
    Failed,
}

impl ActionResultLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across the console and CLI.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    fetches_total: IntCounterVec,
    actions_total: IntCounterVec,
    actions_in_flight: IntGauge,
    fetch_latency_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Fetches applied to state.
    pub fetches_applied: u64,
    /// Fetches discarded because a newer request was issued.
    pub fetches_superseded: u64,
    /// Fetches that failed remotely.
    pub fetches_failed: u64,
    /// Actions currently executing.
    pub actions_in_flight: i64,
    /// Latency of the most recent remote page fetch (ms).
    pub fetch_latency_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fetches_total = IntCounterVec::new(
            Opts::new("codedesk_fetches_total", "Page fetches by result"),
            &["result"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "codedesk_fetches_total",
            source,
        })?;
        let actions_total = IntCounterVec::new(
            Opts::new("codedesk_actions_total", "Code actions executed by kind and result"),
            &["kind", "result"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "codedesk_actions_total",
            source,
        })?;
        let actions_in_flight = IntGauge::with_opts(Opts::new(
            "codedesk_actions_in_flight",
            "Code actions currently awaiting the server",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "codedesk_actions_in_flight",
            source,
        })?;
        let fetch_latency_ms = IntGauge::with_opts(Opts::new(
            "codedesk_fetch_latency_ms",
            "Latency of the most recent page fetch (ms)",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "codedesk_fetch_latency_ms",
            source,
        })?;

        register(&registry, "codedesk_fetches_total", fetches_total.clone())?;
        register(&registry, "codedesk_actions_total", actions_total.clone())?;
        register(
            &registry,
            "codedesk_actions_in_flight",
            actions_in_flight.clone(),
        )?;
        register(
            &registry,
            "codedesk_fetch_latency_ms",
            fetch_latency_ms.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                fetches_total,
                actions_total,
                actions_in_flight,
                fetch_latency_ms,
            }),
        })
    }

    /// Increment the fetch counter for the given result.
    pub fn inc_fetch(&self, result: FetchResultLabel) {
        self.inner
            .fetches_total
            .with_label_values(&[result.as_str()])
            .inc();
    }

    /// Record the latency of a remote page fetch.
    pub fn observe_fetch_latency(&self, duration: Duration) {
        self.inner
            .fetch_latency_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Mark an action as started.
    pub fn action_started(&self) {
        self.inner.actions_in_flight.inc();
    }

    /// Mark an action as settled and count it under `kind`.
    pub fn action_settled(&self, kind: &str, result: ActionResultLabel) {
        self.inner.actions_in_flight.dec();
        self.inner
            .actions_total
            .with_label_values(&[kind, result.as_str()])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the fetch and action collectors.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let fetches = |label: FetchResultLabel| {
            self.inner
                .fetches_total
                .with_label_values(&[label.as_str()])
                .get()
        };
        MetricsSnapshot {
            fetches_applied: fetches(FetchResultLabel::Applied),
            fetches_superseded: fetches(FetchResultLabel::Superseded),
            fetches_failed: fetches(FetchResultLabel::Failed),
            actions_in_flight: self.inner.actions_in_flight.get(),
            fetch_latency_ms: self.inner.fetch_latency_ms.get(),
        }
    }

    /// Count of settled actions for `kind` with the given result.
    #[must_use]
    pub fn action_count(&self, kind: &str, result: ActionResultLabel) -> u64 {
        self.inner
            .actions_total
            .with_label_values(&[kind, result.as_str()])
            .get()
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
