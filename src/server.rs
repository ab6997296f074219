//! The server: one or more listeners plus the per-connection collaborators.
//!
//! The policy and authenticator are rebuilt from their factories for every
//! connection, so they never have to be thread-safe; the deliverer is one
//! shared instance and must tolerate concurrent calls.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    net::TcpListener,
    sync::{Semaphore, broadcast},
};

use crate::{
    internal,
    listener::Listener,
    smtp::session::SessionConfig,
    traits::{auth::Authenticator, deliver::Deliverer, policy::Policy},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}

pub(crate) type PolicyFactory = Box<dyn Fn() -> Box<dyn Policy> + Send + Sync>;
pub(crate) type AuthenticatorFactory = Box<dyn Fn() -> Box<dyn Authenticator> + Send + Sync>;

pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    pub(crate) policy_factory: PolicyFactory,
    pub(crate) authenticator_factory: Option<AuthenticatorFactory>,
    pub(crate) deliverer: Arc<dyn Deliverer>,
    pub(crate) workers: Arc<Semaphore>,
}

pub struct Server {
    addresses: Vec<SocketAddr>,
    shared: Arc<Shared>,
    shutdown: broadcast::Sender<Signal>,
}

impl Server {
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// A handle that stops the server: send [`Signal::Shutdown`] on it.
    /// Listeners stop accepting and running sessions drain.
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<Signal> {
        self.shutdown.clone()
    }

    /// Bind all listen addresses. Useful on its own when listening on port
    /// 0 and the real port is needed before serving.
    pub async fn bind(self) -> anyhow::Result<BoundServer> {
        let mut listeners = Vec::with_capacity(self.addresses.len());
        for address in &self.addresses {
            listeners.push(Listener::new(TcpListener::bind(address).await?));
        }
        Ok(BoundServer {
            listeners,
            shared: self.shared,
            shutdown: self.shutdown,
        })
    }

    /// Bind and serve until shut down.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.bind().await?.serve().await
    }
}

pub struct BoundServer {
    listeners: Vec<Listener>,
    shared: Arc<Shared>,
    shutdown: broadcast::Sender<Signal>,
}

impl BoundServer {
    /// The bound addresses, in the order they were configured.
    pub fn local_addrs(&self) -> std::io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(Listener::local_addr).collect()
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<Signal> {
        self.shutdown.clone()
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        internal!("Server::serve");
        let results = futures_util::future::join_all(
            self.listeners
                .iter()
                .map(|listener| listener.serve(Arc::clone(&self.shared), self.shutdown.clone())),
        )
        .await;

        for result in results {
            result?;
        }
        Ok(())
    }
}

pub struct ServerBuilder {
    addresses: Vec<SocketAddr>,
    config: SessionConfig,
    workers: usize,
    policy_factory: Option<PolicyFactory>,
    authenticator_factory: Option<AuthenticatorFactory>,
    deliverer: Option<Arc<dyn Deliverer>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            addresses: Vec::default(),
            config: SessionConfig::default(),
            workers: 5,
            policy_factory: None,
            authenticator_factory: None,
            deliverer: None,
        }
    }
}

impl ServerBuilder {
    #[must_use]
    pub fn listen(mut self, address: SocketAddr) -> Self {
        self.addresses.push(address);
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// How many connections are serviced concurrently. `1` gives the
    /// strictly sequential single-worker mode.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The policy built for every new connection. Without one, everything
    /// is accepted.
    #[must_use]
    pub fn policy<P, F>(mut self, factory: F) -> Self
    where
        P: Policy + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.policy_factory = Some(Box::new(move || Box::new(factory())));
        self
    }

    /// The authenticator built for every new connection. Without one, AUTH
    /// is not available.
    #[must_use]
    pub fn authenticator<A, F>(mut self, factory: F) -> Self
    where
        A: Authenticator + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.authenticator_factory = Some(Box::new(move || Box::new(factory())));
        self
    }

    #[must_use]
    pub fn deliverer(mut self, deliverer: Arc<dyn Deliverer>) -> Self {
        self.deliverer = Some(deliverer);
        self
    }

    pub fn build(self) -> anyhow::Result<Server> {
        let deliverer = self
            .deliverer
            .ok_or_else(|| anyhow::anyhow!("a server needs a deliverer"))?;
        if self.addresses.is_empty() {
            anyhow::bail!("a server needs at least one listen address");
        }

        let (shutdown, _) = broadcast::channel(16);

        Ok(Server {
            addresses: self.addresses,
            shared: Arc::new(Shared {
                config: self.config,
                policy_factory: self
                    .policy_factory
                    .unwrap_or_else(|| Box::new(|| Box::new(crate::traits::policy::DefaultPolicy))),
                authenticator_factory: self.authenticator_factory,
                deliverer,
                workers: Arc::new(Semaphore::new(self.workers)),
            }),
            shutdown,
        })
    }
}
