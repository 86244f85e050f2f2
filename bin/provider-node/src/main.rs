use anyhow::{Context, Result};
use provider_api::{ProviderOption, ProviderOverrides};
use provider_core::{handler_fn, InvocationContext, ServiceDescriptor};
use provider_dispatch::{LoggingMiddleware, MetricsCollector, MetricsMiddleware, TracingMiddleware};
use provider_registry::MemoryStore;
use provider_runtime::{Provider, ProviderEvent, TransportEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "provider.yaml";
const TRANSPORT_QUEUE: usize = 1024;
const ECHO_INTERFACE: &str = "org.apache.dubbo.demo.EchoService";
const ECHO_VERSION: &str = "1.0.0";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting provider-node...");

    let config_path = std::env::var("PROVIDER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let overrides = ProviderOverrides::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    let option = ProviderOption::from_overrides(overrides)?;
    info!("Configuration loaded from {}", config_path);

    // The networked ZooKeeper client is provided by the host; this node
    // registers into an in-process store.
    let store = Arc::new(MemoryStore::new());

    let metrics = MetricsCollector::new()?;
    let service_name = option.application.name.clone();
    let mut provider = Provider::new(option, store.clone());
    provider.use_middleware(TracingMiddleware::with_service_name(service_name));
    provider.use_middleware(LoggingMiddleware);
    provider.use_middleware(MetricsMiddleware::new(metrics.clone()));
    provider.add_service(echo_service()).await?;

    let mut events = provider.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ProviderEvent::SessionError { state, option } => {
                    warn!(
                        "Coordination session {} (configuration attached: {})",
                        state,
                        option.is_some()
                    );
                }
            }
        }
    });

    let (transport, inbound) = mpsc::channel(TRANSPORT_QUEUE);
    let runner = tokio::spawn(provider.run(inbound));
    transport.send(TransportEvent::Ready).await?;

    let (context, response) =
        InvocationContext::with_channel(ECHO_INTERFACE, ECHO_VERSION, "echo", vec![json!("ping")]);
    transport.send(TransportEvent::Invoke(context)).await?;
    match response.await? {
        Ok(value) => info!("Self-check response: {}", value),
        Err(e) => warn!("Self-check failed: {}", e),
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down provider-node...");
    drop(transport);
    runner.await??;

    for (path, mode) in store.nodes() {
        info!("{:?} {}", mode, path);
    }
    info!("Metrics:\n{}", metrics.gather()?);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PROVIDER_LOG_JSON").map(|v| v == "1").unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn echo_service() -> ServiceDescriptor {
    ServiceDescriptor::new(ECHO_INTERFACE, ECHO_VERSION)
        .method(
            "echo",
            handler_fn(|args: Vec<Value>| async move {
                Ok::<_, anyhow::Error>(args.into_iter().next().unwrap_or(Value::Null))
            }),
        )
        .method(
            "reverse",
            handler_fn(|args: Vec<Value>| async move {
                let text = args
                    .first()
                    .and_then(Value::as_str)
                    .context("reverse expects a string argument")?;
                Ok::<_, anyhow::Error>(json!(text.chars().rev().collect::<String>()))
            }),
        )
}
