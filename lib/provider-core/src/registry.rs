//! Ordered registry of locally hosted services

use crate::{ProviderError, Result, ServiceDescriptor};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// ServiceRegistry holds the provider's services in the order they were added.
///
/// Append-only: services are added before start and only read afterwards by
/// the dispatcher and the registrar. Clones share the same list.
#[derive(Clone)]
pub struct ServiceRegistry {
    services: Arc<RwLock<Vec<Arc<ServiceDescriptor>>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a service
    pub async fn add_service(&self, service: ServiceDescriptor) -> Result<Arc<ServiceDescriptor>> {
        if service.interface().trim().is_empty() {
            return Err(ProviderError::InvalidService(
                "interface name must not be empty".to_string(),
            ));
        }

        let service = Arc::new(service);
        let mut services = self.services.write().await;
        services.push(service.clone());

        debug!(
            "Added service: {}@{} ({} total)",
            service.interface(),
            service.version(),
            services.len()
        );
        Ok(service)
    }

    /// First service whose interface and version both match exactly
    pub async fn find(&self, interface: &str, version: &str) -> Option<Arc<ServiceDescriptor>> {
        let services = self.services.read().await;
        services
            .iter()
            .find(|s| s.matches(interface, version))
            .cloned()
    }

    /// Snapshot of all services, in insertion order
    pub async fn list_services(&self) -> Vec<Arc<ServiceDescriptor>> {
        let services = self.services.read().await;
        services.clone()
    }

    /// Interface names of all services, in insertion order, duplicates kept
    pub async fn interface_names(&self) -> Vec<String> {
        let services = self.services.read().await;
        services.iter().map(|s| s.interface().to_string()).collect()
    }

    /// Get count of registered services
    pub async fn service_count(&self) -> usize {
        let services = self.services.read().await;
        services.len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
