//! Trace-context propagation middleware

use crate::middleware::{Middleware, Next};
use provider_core::{InvocationContext, InvocationResult};
use std::fmt::Write;
use tracing::{error, info, info_span, Instrument};

/// Attachment carrying the W3C trace context
pub const TRACEPARENT: &str = "traceparent";

/// Correlates invocations by trace id, reusing the caller's when present
pub struct TracingMiddleware {
    /// Service name for traces
    pub service_name: String,
}

impl TracingMiddleware {
    pub fn new() -> Self {
        Self {
            service_name: "dubbo-provider".to_string(),
        }
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Extract (trace_id, span_id, trace_flags) from a `traceparent` value
    pub fn parse_traceparent(value: &str) -> Option<(String, String, String)> {
        // version-trace_id-span_id-trace_flags
        let parts: Vec<&str> = value.split('-').collect();
        if parts.len() >= 4 {
            Some((parts[1].to_string(), parts[2].to_string(), parts[3].to_string()))
        } else {
            None
        }
    }

    pub fn format_traceparent(trace_id: &str, span_id: &str, trace_flags: &str) -> String {
        format!("00-{}-{}-{}", trace_id, span_id, trace_flags)
    }

    /// Generate a new span ID (random 16 hex digits)
    pub fn generate_span_id() -> String {
        random_hex(8)
    }

    /// Generate a new trace ID (random 32 hex digits)
    pub fn generate_trace_id() -> String {
        random_hex(16)
    }
}

fn random_hex(bytes: usize) -> String {
    let mut id = String::with_capacity(bytes * 2);
    for _ in 0..bytes {
        write!(&mut id, "{:02x}", rand::random::<u8>()).ok();
    }
    id
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "TracingMiddleware"
    }

    async fn handle(&self, context: &InvocationContext, next: Next<'_>) -> InvocationResult {
        let (trace_id, trace_flags) = match context.attachment(TRACEPARENT).and_then(Self::parse_traceparent) {
            Some((trace_id, _, trace_flags)) => (trace_id, trace_flags),
            None => (Self::generate_trace_id(), "01".to_string()),
        };
        let span_id = Self::generate_span_id();

        // Outbound calls made by the handler continue this trace
        context.set_metadata(
            TRACEPARENT,
            Self::format_traceparent(&trace_id, &span_id, &trace_flags),
        );
        context.set_metadata("trace_id", trace_id.clone());
        context.set_metadata("span_id", span_id.clone());

        let span = info_span!(
            "invocation",
            service = %self.service_name,
            trace_id = %trace_id,
            span_id = %span_id,
        );

        async move {
            info!(signature = %context.signature(), "Invocation started");
            let result = next.run(context).await;
            match &result {
                Ok(_) => info!(signature = %context.signature(), "Invocation completed"),
                Err(e) => error!(signature = %context.signature(), error = %e, "Invocation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
