//! Invocation dispatch through an onion middleware pipeline
pub mod dispatcher;
pub mod metrics;
pub mod middleware;
pub mod trace;

pub use dispatcher::Dispatcher;
pub use metrics::{MetricsCollector, MetricsMiddleware};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, Next};
pub use trace::TracingMiddleware;
