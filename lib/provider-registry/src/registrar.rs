//! Registers every locally hosted service in the coordination store

use crate::client::{CoordinationClient, CreateMode, StoreError};
use crate::path::PathEnsurer;
use crate::url::{ProviderUrl, RegistrationQuery};
use provider_api::ProviderOption;
use provider_core::{ServiceDescriptor, ServiceRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Failed to register {interface} at {path}: {source}")]
    Store {
        interface: String,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Registration task for {interface} aborted: {reason}")]
    Aborted { interface: String, reason: String },
}

/// Disambiguates instance paths when an interface name is registered more than once.
///
/// First use of a name yields the bare name, later uses yield the name
/// followed by the incremented count: `Foo`, `Foo2`, `Foo3`.
#[derive(Debug, Default)]
pub struct InterfaceInstanceCounter {
    counts: HashMap<String, u32>,
}

impl InterfaceInstanceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_instance_path(&mut self, interface: &str) -> String {
        let count = self.counts.entry(interface.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            interface.to_string()
        } else {
            format!("{}{}", interface, count)
        }
    }
}

/// Registrations handed out so far, by position in the service list
#[derive(Default)]
struct InstanceAssignments {
    counter: InterfaceInstanceCounter,
    assigned: Vec<Registration>,
}

/// One service's registration target
#[derive(Clone, Debug)]
pub struct Registration {
    pub interface: String,
    pub version: String,
    pub instance_path: String,
    pub url: String,
    /// Full node path of the ephemeral provider leaf
    pub path: String,
}

/// Handles to the registrations started by one pass.
///
/// Dropping the pass detaches the tasks; each one logs its own outcome.
pub struct RegistrationPass {
    tasks: Vec<(Registration, JoinHandle<Result<(), RegistrationError>>)>,
}

impl RegistrationPass {
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.tasks.iter().map(|(registration, _)| registration)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every registration of the pass, in service order
    pub async fn wait(self) -> Vec<Result<Registration, RegistrationError>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for (registration, handle) in self.tasks {
            let result = match handle.await {
                Ok(Ok(())) => Ok(registration),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(RegistrationError::Aborted {
                    interface: registration.interface,
                    reason: e.to_string(),
                }),
            };
            results.push(result);
        }
        results
    }
}

/// ServiceRegistrar advertises the provider's services under the namespace root
pub struct ServiceRegistrar {
    option: Arc<ProviderOption>,
    services: ServiceRegistry,
    ensurer: PathEnsurer,
    instances: Mutex<InstanceAssignments>,
}

impl ServiceRegistrar {
    pub fn new(
        option: Arc<ProviderOption>,
        services: ServiceRegistry,
        client: Arc<dyn CoordinationClient>,
    ) -> Self {
        Self {
            option,
            services,
            ensurer: PathEnsurer::new(client),
            instances: Mutex::new(InstanceAssignments::default()),
        }
    }

    /// Compute the registration of every held service, in service order.
    ///
    /// Registrations are assigned here, before any store call. A service keeps
    /// the URL and leaf path from its first pass, so a later pass in the same
    /// session finds its leaf already present.
    pub async fn plan(&self) -> Vec<Registration> {
        let services = self.services.list_services().await;
        let mut instances = match self.instances.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if instances.assigned.len() < services.len() {
            let timestamp_ms = chrono::Utc::now().timestamp_millis();
            let pid = std::process::id();
            let InstanceAssignments { counter, assigned } = &mut *instances;
            for service in services.iter().skip(assigned.len()) {
                let instance_path = counter.next_instance_path(service.interface());
                assigned.push(self.registration(service, instance_path, pid, timestamp_ms));
            }
        }

        instances.assigned.iter().take(services.len()).cloned().collect()
    }

    fn registration(
        &self,
        service: &ServiceDescriptor,
        instance_path: String,
        pid: u32,
        timestamp_ms: i64,
    ) -> Registration {
        let url = ProviderUrl {
            host: self.option.host.clone(),
            port: self.option.port,
            instance_path: instance_path.clone(),
            query: RegistrationQuery::build(&self.option, service, pid, timestamp_ms),
        };
        Registration {
            interface: service.interface().to_string(),
            version: service.version().to_string(),
            instance_path,
            path: url.registration_path(&self.option.registry.root, service.interface()),
            url: url.to_string(),
        }
    }

    /// Start registering every held service.
    ///
    /// Registrations start in service order and run independently; one
    /// failing does not affect the others.
    pub async fn register_all(&self) -> RegistrationPass {
        let plan = self.plan().await;
        info!("Registering {} services", plan.len());

        let tasks = plan
            .into_iter()
            .map(|registration| {
                let ensurer = self.ensurer.clone();
                let target = registration.clone();
                let handle = tokio::spawn(async move {
                    debug!(interface = %target.interface, path = %target.path, "Registering provider");
                    match ensurer.ensure(&target.path, CreateMode::Ephemeral).await {
                        Ok(()) => {
                            info!(
                                interface = %target.interface,
                                version = %target.version,
                                instance = %target.instance_path,
                                "Provider registered"
                            );
                            Ok(())
                        }
                        Err(source) => {
                            error!(
                                interface = %target.interface,
                                error = %source,
                                "Provider registration failed"
                            );
                            Err(RegistrationError::Store {
                                interface: target.interface,
                                path: target.path,
                                source,
                            })
                        }
                    }
                });
                (registration, handle)
            })
            .collect();

        RegistrationPass { tasks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::path::parent_path;
    use crate::url::encode_component;
    use provider_api::{ApplicationOverrides, ProviderOverrides, RegistryOverrides};
    use provider_core::handler_fn;
    use serde_json::Value;

    fn option() -> Arc<ProviderOption> {
        Arc::new(
            ProviderOption::from_overrides(ProviderOverrides {
                host: Some("10.0.0.5".to_string()),
                port: Some(20880),
                application: ApplicationOverrides {
                    name: Some("shop".to_string()),
                    version: None,
                },
                registry: RegistryOverrides {
                    address: Some("zk:2181".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn service(interface: &str, version: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(interface, version).method(
            "call",
            handler_fn(|_args: Vec<Value>| async { Ok::<_, anyhow::Error>(Value::Null) }),
        )
    }

    async fn setup(services: &[(&str, &str)]) -> (Arc<MemoryStore>, ServiceRegistrar) {
        let store = Arc::new(MemoryStore::new());
        let registry = ServiceRegistry::new();
        for (interface, version) in services {
            registry.add_service(service(interface, version)).await.unwrap();
        }
        let registrar = ServiceRegistrar::new(option(), registry, store.clone());
        (store, registrar)
    }

    #[test]
    fn test_counter_suffixes() {
        let mut counter = InterfaceInstanceCounter::new();
        assert_eq!(counter.next_instance_path("Foo"), "Foo");
        assert_eq!(counter.next_instance_path("Bar"), "Bar");
        assert_eq!(counter.next_instance_path("Foo"), "Foo2");
        assert_eq!(counter.next_instance_path("Foo"), "Foo3");
    }

    #[tokio::test]
    async fn test_same_interface_gets_suffixed_in_add_order() {
        let (_store, registrar) = setup(&[("Foo", "1.0.0"), ("Foo", "2.0.0"), ("Foo", "3.0.0")]).await;
        let plan = registrar.plan().await;
        let instances: Vec<(&str, &str)> = plan
            .iter()
            .map(|r| (r.instance_path.as_str(), r.version.as_str()))
            .collect();
        assert_eq!(instances, vec![("Foo", "1.0.0"), ("Foo2", "2.0.0"), ("Foo3", "3.0.0")]);
    }

    #[tokio::test]
    async fn test_instance_paths_stable_across_passes() {
        let (_store, registrar) = setup(&[("Foo", "1.0.0"), ("Foo", "2.0.0")]).await;
        let first: Vec<String> = registrar.plan().await.into_iter().map(|r| r.instance_path).collect();
        let second: Vec<String> = registrar.plan().await.into_iter().map(|r| r.instance_path).collect();
        assert_eq!(first, vec!["Foo", "Foo2"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_counters_are_per_registrar() {
        let (_s1, first) = setup(&[("Foo", "1.0.0")]).await;
        let (_s2, second) = setup(&[("Foo", "1.0.0")]).await;
        assert_eq!(first.plan().await[0].instance_path, "Foo");
        assert_eq!(second.plan().await[0].instance_path, "Foo");
    }

    #[tokio::test]
    async fn test_registration_path_layout() {
        let (_store, registrar) = setup(&[("com.demo.Foo", "1.0.0")]).await;
        let registration = registrar.plan().await.remove(0);
        assert!(registration.url.starts_with("dubbo://10.0.0.5:20880/com.demo.Foo?"));
        assert_eq!(
            registration.path,
            format!("/dubbo/com.demo.Foo/providers/{}", encode_component(&registration.url))
        );
    }

    #[tokio::test]
    async fn test_register_all_creates_nodes() {
        let (store, registrar) = setup(&[("com.demo.Foo", "1.0.0"), ("com.demo.Bar", "1.0.0")]).await;
        let results = registrar.register_all().await.wait().await;
        assert_eq!(results.len(), 2);

        for result in results {
            let registration = result.unwrap();
            assert_eq!(store.mode(&registration.path), Some(CreateMode::Ephemeral));
            let providers = parent_path(&registration.path).unwrap();
            assert_eq!(store.mode(providers), Some(CreateMode::Persistent));
            let root = parent_path(providers).unwrap();
            assert_eq!(
                store.children(root),
                vec!["configurators", "consumers", "providers", "routers"]
            );
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_service() {
        let (store, registrar) = setup(&[("com.demo.Foo", "1.0.0"), ("com.demo.Bar", "1.0.0")]).await;
        store.fail_on("/dubbo/com.demo.Foo", StoreError::Other("no auth".to_string()));

        let results = registrar.register_all().await.wait().await;
        assert!(matches!(
            &results[0],
            Err(RegistrationError::Store { interface, .. }) if interface == "com.demo.Foo"
        ));
        let bar = results[1].as_ref().unwrap();
        assert!(store.contains(&bar.path));
    }

    #[tokio::test]
    async fn test_repeated_pass_is_idempotent() {
        let (store, registrar) = setup(&[("com.demo.Foo", "1.0.0")]).await;
        let first: Vec<Registration> = registrar
            .register_all()
            .await
            .wait()
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second: Vec<Registration> = registrar
            .register_all()
            .await
            .wait()
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(first[0].url, second[0].url);
        assert_eq!(first[0].path, second[0].path);
        assert_eq!(store.children("/dubbo/com.demo.Foo").len(), 4);
        assert_eq!(store.children("/dubbo/com.demo.Foo/providers").len(), 1);
    }

    #[tokio::test]
    async fn test_services_added_later_get_new_registrations() {
        let (store, registrar) = setup(&[("com.demo.Foo", "1.0.0")]).await;
        let first = registrar.plan().await;
        registrar.services.add_service(service("com.demo.Foo", "2.0.0")).await.unwrap();

        let second = registrar.plan().await;
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].url, first[0].url);
        assert_eq!(second[1].instance_path, "com.demo.Foo2");

        for result in registrar.register_all().await.wait().await {
            result.unwrap();
        }
        assert_eq!(store.children("/dubbo/com.demo.Foo/providers").len(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry_starts_nothing() {
        let (_store, registrar) = setup(&[]).await;
        let pass = registrar.register_all().await;
        assert!(pass.is_empty());
    }
}
