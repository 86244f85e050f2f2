//! Prometheus metrics middleware for invocation observability

use crate::middleware::{Middleware, Next};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use provider_core::{InvocationContext, InvocationResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Prometheus metrics collector for invocations
#[derive(Clone)]
pub struct MetricsCollector {
    /// Total invocations received
    pub invocations_total: CounterVec,
    /// Invocation latency in seconds
    pub invocation_duration_seconds: HistogramVec,
    /// Invocations that completed with an error
    pub invocation_errors_total: CounterVec,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let invocations_total = CounterVec::new(
            Opts::new("invocations_total", "Total invocations dispatched"),
            &["interface", "method"],
        )?;

        let invocation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "invocation_duration_seconds",
                "Invocation latency in seconds",
            ),
            &["interface", "method"],
        )?;

        let invocation_errors_total = CounterVec::new(
            Opts::new("invocation_errors_total", "Total failed invocations"),
            &["interface", "method"],
        )?;

        registry.register(Box::new(invocations_total.clone()))?;
        registry.register(Box::new(invocation_duration_seconds.clone()))?;
        registry.register(Box::new(invocation_errors_total.clone()))?;

        Ok(Self {
            invocations_total,
            invocation_duration_seconds,
            invocation_errors_total,
            registry,
        })
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Prometheus metrics middleware
pub struct MetricsMiddleware {
    pub collector: MetricsCollector,
}

impl MetricsMiddleware {
    /// Create a new metrics middleware
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

#[async_trait::async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "MetricsMiddleware"
    }

    async fn handle(&self, context: &InvocationContext, next: Next<'_>) -> InvocationResult {
        let labels = [context.interface.as_str(), context.method.as_str()];
        self.collector.invocations_total.with_label_values(&labels).inc();

        let started = Instant::now();
        let result = next.run(context).await;
        self.collector
            .invocation_duration_seconds
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());

        if result.is_err() {
            debug!("Recording error metrics for {}", context.signature());
            self.collector.invocation_errors_total.with_label_values(&labels).inc();
        }
        result
    }
}
