//! Per-call invocation context

use crate::error::ProviderError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Outcome delivered to the transport: the produced value or the failure reason
pub type InvocationResult = std::result::Result<Value, ProviderError>;

type Completion = Box<dyn FnOnce(InvocationResult) + Send + Sync>;

/// An inbound call, created by the transport layer and consumed once by the dispatcher.
///
/// Completion is tied to ownership: [`InvocationContext::respond`] takes `self`,
/// so the completion callback runs exactly once per context.
pub struct InvocationContext {
    /// Identifier used for log correlation
    pub id: Uuid,
    pub interface: String,
    pub version: String,
    pub method: String,
    pub arguments: Vec<Value>,
    /// Implicit parameters carried alongside the call
    pub attachments: HashMap<String, String>,
    /// Scratch space for middleware
    metadata: Mutex<HashMap<String, String>>,
    completion: Completion,
}

impl InvocationContext {
    /// Create a context whose outcome is handed to `on_complete`
    pub fn new<F>(
        interface: impl Into<String>,
        version: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<Value>,
        on_complete: F,
    ) -> Self
    where
        F: FnOnce(InvocationResult) + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            interface: interface.into(),
            version: version.into(),
            method: method.into(),
            arguments,
            attachments: HashMap::new(),
            metadata: Mutex::new(HashMap::new()),
            completion: Box::new(on_complete),
        }
    }

    /// Create a context whose outcome is delivered over a oneshot channel
    pub fn with_channel(
        interface: impl Into<String>,
        version: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<Value>,
    ) -> (Self, oneshot::Receiver<InvocationResult>) {
        let (tx, rx) = oneshot::channel();
        let context = Self::new(interface, version, method, arguments, move |result| {
            if tx.send(result).is_err() {
                debug!("Invocation receiver dropped before completion");
            }
        });
        (context, rx)
    }

    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    /// `interface#method@version`, the form used in diagnostics
    pub fn signature(&self) -> String {
        format!("{}#{}@{}", self.interface, self.method, self.version)
    }

    /// Get a metadata value
    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata
            .lock()
            .ok()
            .and_then(|m| m.get(key).cloned())
    }

    /// Set a metadata value
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut m) = self.metadata.lock() {
            m.insert(key.into(), value.into());
        }
    }

    /// Deliver the outcome, consuming the context
    pub fn respond(self, result: InvocationResult) {
        (self.completion)(result);
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.id)
            .field("interface", &self.interface)
            .field("version", &self.version)
            .field("method", &self.method)
            .field("arguments", &self.arguments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_context_metadata() {
        let (context, _rx) = InvocationContext::with_channel("com.demo.Foo", "1.0.0", "bar", vec![]);
        context.set_metadata("key1", "value1");
        assert_eq!(context.get_metadata("key1"), Some("value1".to_string()));
        assert_eq!(context.get_metadata("key2"), None);
    }

    #[test]
    fn test_signature() {
        let (context, _rx) = InvocationContext::with_channel("com.demo.Foo", "1.0.0", "bar", vec![]);
        assert_eq!(context.signature(), "com.demo.Foo#bar@1.0.0");
    }

    #[test]
    fn test_attachments() {
        let (context, _rx) = InvocationContext::with_channel("com.demo.Foo", "1.0.0", "bar", vec![]);
        let context = context.with_attachment("traceparent", "00-abc-def-01");
        assert_eq!(context.attachment("traceparent"), Some("00-abc-def-01"));
        assert_eq!(context.attachment("missing"), None);
    }

    #[test]
    fn test_respond_invokes_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let context = InvocationContext::new("com.demo.Foo", "1.0.0", "bar", vec![], move |result| {
            assert_eq!(result.unwrap(), json!(1));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        context.respond(Ok(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_delivers_failure() {
        let (context, rx) = InvocationContext::with_channel("com.demo.Foo", "1.0.0", "bar", vec![]);
        context.respond(Err(ProviderError::ServiceNotFound("nope".to_string())));
        let result = rx.await.unwrap();
        assert!(result.unwrap_err().is_not_found());
    }
}
