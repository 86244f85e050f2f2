//! The provider: owns services, middleware and configuration

use crate::event::{ProviderEvent, TransportEvent};
use provider_api::{ProviderOption, SessionState};
use provider_core::{ProviderError, ServiceDescriptor, ServiceRegistry, SessionEffect, SessionMachine};
use provider_dispatch::{Dispatcher, Middleware, MiddlewareChain};
use provider_registry::{CoordinationClient, ServiceRegistrar};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Service error: {0}")]
    Service(#[from] ProviderError),
}

/// Provider hosts services and advertises them in the coordination store.
///
/// Services and middleware are added before [`Provider::run`]; from then on
/// both lists are only read.
pub struct Provider {
    option: Arc<ProviderOption>,
    services: ServiceRegistry,
    middleware: MiddlewareChain,
    client: Arc<dyn CoordinationClient>,
    events: broadcast::Sender<ProviderEvent>,
}

impl Provider {
    pub fn new(option: ProviderOption, client: Arc<dyn CoordinationClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            option: Arc::new(option),
            services: ServiceRegistry::new(),
            middleware: MiddlewareChain::new(),
            client,
            events,
        }
    }

    pub fn option(&self) -> &Arc<ProviderOption> {
        &self.option
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Append a middleware; the first added runs outermost
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.push(middleware);
    }

    pub async fn add_service(&self, service: ServiceDescriptor) -> Result<Arc<ServiceDescriptor>, RuntimeError> {
        debug!("Adding service {}@{}", service.interface(), service.version());
        Ok(self.services.add_service(service).await?)
    }

    /// Receive host notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    /// Run until the transport channel closes.
    ///
    /// `Ready` connects to the coordination store; each session state report
    /// goes through the session machine; each `Invoke` is dispatched on its
    /// own task.
    pub async fn run(self, mut transport: mpsc::Receiver<TransportEvent>) -> Result<(), RuntimeError> {
        info!(
            "Starting provider {} on {}:{} ({} services, middleware: {:?})",
            self.option.application.name,
            self.option.host,
            self.option.port,
            self.services.service_count().await,
            self.middleware.names()
        );

        let dispatcher = Dispatcher::new(self.services.clone(), self.middleware.clone());
        let registrar = ServiceRegistrar::new(self.option.clone(), self.services.clone(), self.client.clone());
        let mut machine = SessionMachine::new();
        let mut states: Option<broadcast::Receiver<SessionState>> = None;

        loop {
            tokio::select! {
                event = transport.recv() => match event {
                    Some(TransportEvent::Ready) => {
                        if states.is_some() {
                            debug!("Transport ready again, session already started");
                            continue;
                        }
                        states = Some(self.client.subscribe_states());
                        if !self.connect().await {
                            states = None;
                        }
                    }
                    Some(TransportEvent::Invoke(context)) => {
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move { dispatcher.dispatch(context).await });
                    }
                    None => {
                        info!("Transport closed, provider stopping");
                        return Ok(());
                    }
                },
                state = next_state(&mut states) => match state {
                    Some(state) => {
                        for effect in machine.on_state(state) {
                            self.apply(effect, &registrar).await;
                        }
                    }
                    None => {
                        warn!("Coordination client stopped reporting session states");
                        states = None;
                    }
                },
            }
        }
    }

    /// Connect the client; a failure is raised to the host and a later
    /// `Ready` tries again
    async fn connect(&self) -> bool {
        let registry = &self.option.registry;
        info!("Connecting to coordination store at {}", registry.address);
        match self.client.connect(registry).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to connect to {}: {}", registry.address, e);
                self.raise(SessionState::Disconnected, true);
                false
            }
        }
    }

    async fn apply(&self, effect: SessionEffect, registrar: &ServiceRegistrar) {
        match effect {
            SessionEffect::RegisterServices => {
                info!(
                    "Coordination store connected, registering providers at {}",
                    self.option.registry.address
                );
                let pass = registrar.register_all().await;
                debug!("Started {} registrations", pass.len());
            }
            SessionEffect::RaiseError { state, with_option } => {
                warn!(state = %state, address = %self.option.registry.address, "Coordination session problem");
                self.raise(state, with_option);
            }
        }
    }

    fn raise(&self, state: SessionState, with_option: bool) {
        let event = ProviderEvent::SessionError {
            state,
            option: with_option.then(|| self.option.clone()),
        };
        if self.events.send(event).is_err() {
            debug!("No host subscribed to provider events");
        }
    }
}

/// Next reported session state; pending until the session has been started
async fn next_state(states: &mut Option<broadcast::Receiver<SessionState>>) -> Option<SessionState> {
    let Some(receiver) = states.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(state) => return Some(state),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {} session state reports", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
