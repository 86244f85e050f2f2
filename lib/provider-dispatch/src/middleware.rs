//! Onion-model middleware for invocation processing
//!
//! Each middleware receives the context and a [`Next`] continuation. Code
//! before `next.run(..)` runs on the way in, code after it on the way out, and
//! a middleware that never calls `next` short-circuits everything inside it.

use futures::FutureExt;
use provider_core::{InvocationContext, InvocationResult, MethodHandler, ProviderError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, span, warn, Instrument, Level};

#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str {
        "UnnamedMiddleware"
    }

    /// Process the invocation, delegating inward through `next`
    async fn handle(&self, context: &InvocationContext, next: Next<'_>) -> InvocationResult;
}

/// The rest of the pipeline: remaining middleware, then the handler
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn MethodHandler,
}

impl<'a> Next<'a> {
    /// Run the remaining pipeline
    pub async fn run(self, context: &InvocationContext) -> InvocationResult {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middleware: rest,
                    handler: self.handler,
                };
                let span = span!(Level::DEBUG, "middleware", name = current.name());
                current.handle(context, next).instrument(span).await
            }
            None => self.handler.call(context).await.map_err(ProviderError::from),
        }
    }
}

/// Ordered middleware; the first added is the outermost layer
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new middleware chain
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Add middleware to the chain
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.push(middleware);
        self
    }

    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Run the chain around `handler`.
    ///
    /// Errors and panics raised anywhere inside the chain come back as
    /// `ProviderError::InvocationFailed`.
    pub async fn execute(&self, context: &InvocationContext, handler: &dyn MethodHandler) -> InvocationResult {
        let next = Next {
            middleware: &self.middleware,
            handler,
        };
        match AssertUnwindSafe(next.run(context)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ProviderError::InvocationFailed(anyhow::anyhow!(
                "panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Logging middleware that logs invocation start, outcome and duration
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }

    async fn handle(&self, context: &InvocationContext, next: Next<'_>) -> InvocationResult {
        debug!(
            "Invocation: {} (id: {}, args: {})",
            context.signature(),
            context.id,
            context.arguments.len()
        );
        let started = Instant::now();
        let result = next.run(context).await;
        let elapsed = started.elapsed().as_millis();

        match &result {
            Ok(_) => debug!("Completed: {} ({}ms)", context.signature(), elapsed),
            Err(e) => warn!("Failed: {} ({}ms) - {}", context.signature(), elapsed, e),
        }
        result
    }
}
