//! Service descriptors and method handlers

use crate::context::InvocationContext;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A single callable method of a hosted service
#[async_trait::async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, context: &InvocationContext) -> anyhow::Result<Value>;
}

/// Adapter turning an async function over the call arguments into a handler
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure taking the invocation arguments as a [`MethodHandler`]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait::async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, context: &InvocationContext) -> anyhow::Result<Value> {
        (self.f)(context.arguments.clone()).await
    }
}

/// A locally hosted service: interface name, version and its methods.
///
/// Immutable once handed to the registry. Methods keep declaration order,
/// which is the order advertised in the `methods` registration field.
#[derive(Clone)]
pub struct ServiceDescriptor {
    interface: String,
    version: String,
    methods: Vec<(String, Arc<dyn MethodHandler>)>,
}

impl ServiceDescriptor {
    pub fn new(interface: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            version: version.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method. Re-declaring a name replaces its handler in place.
    pub fn method<H: MethodHandler + 'static>(mut self, name: impl Into<String>, handler: H) -> Self {
        let name = name.into();
        let handler: Arc<dyn MethodHandler> = Arc::new(handler);
        match self.methods.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = handler,
            None => self.methods.push((name, handler)),
        }
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Method names in declaration order
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(name, _)| name.as_str())
    }

    pub fn handler(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, handler)| handler.clone())
    }

    /// Exact match on both interface and version
    pub fn matches(&self, interface: &str, version: &str) -> bool {
        self.interface == interface && self.version == version
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("interface", &self.interface)
            .field("version", &self.version)
            .field("methods", &self.method_names().collect::<Vec<_>>())
            .finish()
    }
}
