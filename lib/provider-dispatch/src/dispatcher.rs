//! Resolves invocations to local handlers and runs them through the middleware chain

use crate::middleware::MiddlewareChain;
use provider_core::{InvocationContext, MethodHandler, ProviderError, ServiceRegistry};
use std::sync::Arc;
use tracing::debug;

/// Dispatcher routes each inbound invocation to its handler.
///
/// Stateless per call: it only reads the shared service list and middleware.
#[derive(Clone)]
pub struct Dispatcher {
    services: ServiceRegistry,
    middleware: Arc<MiddlewareChain>,
}

impl Dispatcher {
    pub fn new(services: ServiceRegistry, middleware: MiddlewareChain) -> Self {
        Self {
            services,
            middleware: Arc::new(middleware),
        }
    }

    /// Find the handler for the context's interface, version and method
    pub async fn resolve(&self, context: &InvocationContext) -> Result<Arc<dyn MethodHandler>, ProviderError> {
        let handler = self
            .services
            .find(&context.interface, &context.version)
            .await
            .and_then(|service| service.handler(&context.method));

        match handler {
            Some(handler) => Ok(handler),
            None => {
                let known = self.services.interface_names().await;
                Err(ProviderError::ServiceNotFound(format!(
                    "{} in [{}]",
                    context.signature(),
                    known.join(",")
                )))
            }
        }
    }

    /// Handle one invocation; the context's completion fires exactly once
    pub async fn dispatch(&self, context: InvocationContext) {
        debug!("Dispatching {} (id: {})", context.signature(), context.id);
        let result = match self.resolve(&context).await {
            Ok(handler) => self.middleware.execute(&context, handler.as_ref()).await,
            Err(e) => {
                debug!("{}", e);
                Err(e)
            }
        };
        context.respond(result);
    }
}
