//! Prometheus metrics for the synchronizer.
//!
//! The collector owns its registry; exposing it over HTTP is left to the
//! embedding process.

use std::sync::Arc;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};

use crate::cache::ArtifactKind;

/// Synchronizer metrics.
#[derive(Clone)]
pub struct SyncMetrics {
    synchronization_total: CounterVec,
    synchronization_duration: HistogramVec,
    push_failures: CounterVec,
    superseded: IntCounter,

    registry: Arc<Registry>,
}

impl SyncMetrics {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let synchronization_total = CounterVec::new(
            Opts::new(
                "fabric_adapter_synchronization_total",
                "Total synchronization passes per fabric",
            ),
            &["fabric"],
        )?;
        registry.register(Box::new(synchronization_total.clone()))?;

        let synchronization_duration = HistogramVec::new(
            HistogramOpts::new(
                "fabric_adapter_synchronization_duration_seconds",
                "Duration of a synchronization pass per fabric in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
            &["fabric"],
        )?;
        registry.register(Box::new(synchronization_duration.clone()))?;

        let push_failures = CounterVec::new(
            Opts::new(
                "fabric_adapter_push_failures_total",
                "Total failed pushes by artifact kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(push_failures.clone()))?;

        let superseded = IntCounter::new(
            "fabric_adapter_updates_superseded_total",
            "Total updates abandoned in favour of a newer one",
        )?;
        registry.register(Box::new(superseded.clone()))?;

        Ok(Self {
            synchronization_total,
            synchronization_duration,
            push_failures,
            superseded,
            registry: Arc::new(registry),
        })
    }

    /// Counts a synchronization pass of `fabric`.
    pub fn record_synchronization(&self, fabric: &str) {
        self.synchronization_total.with_label_values(&[fabric]).inc();
    }

    /// Records how long a pass of `fabric` took.
    pub fn observe_duration(&self, fabric: &str, seconds: f64) {
        self.synchronization_duration
            .with_label_values(&[fabric])
            .observe(seconds);
    }

    /// Counts a failed push.
    pub fn record_push_failure(&self, kind: ArtifactKind) {
        self.push_failures
            .with_label_values(&[kind.to_string().as_str()])
            .inc();
    }

    /// Counts an abandoned update.
    pub fn record_superseded(&self) {
        self.superseded.inc();
    }

    /// Renders every metric in the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = vec![];
        encoder.encode(&self.registry.gather(), &mut buf).ok();
        String::from_utf8(buf).unwrap_or_else(|_| String::from("# Error encoding metrics\n"))
    }
}
