//! # Process Wiring
//!
//! Turns configuration into live dependencies: for every remote service a
//! process needs, pick the connector matching its transport type, open a
//! transport, negotiate a session, and hand the proxies onward — either
//! as a [`Registry`] for direct consumption or injected in declared order
//! into a service factory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::client::{self, ClientOptions, NegotiateError};
use crate::config::{Config, ConfigError, ServiceOptions};
use crate::proc::ProcTree;
use crate::registry::Registry;
use crate::remote::Remote;
use crate::transport::{self, Transport};

/// A transport factory: opens a transport to one configured service.
/// Implementations exist per transport type (see `net::TcpConnector`).
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &Value) -> transport::Result<Arc<dyn Transport>>;
}

/// Wiring failures.
#[derive(Debug)]
pub enum LoadError {
    /// A dependency name has no entry in the configuration.
    UnknownService(String),
    /// A configured transport type has no registered connector.
    UnknownTransport(String),
    Config(ConfigError),
    Transport(transport::Error),
    Negotiate(NegotiateError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownService(name) => write!(f, "Service '{}' is not configured", name),
            Self::UnknownTransport(name) => {
                write!(f, "No connector registered for transport type '{}'", name)
            }
            Self::Config(e) => write!(f, "{}", e),
            Self::Transport(e) => write!(f, "{}", e),
            Self::Negotiate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Negotiate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<transport::Error> for LoadError {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<NegotiateError> for LoadError {
    fn from(e: NegotiateError) -> Self {
        Self::Negotiate(e)
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Resolves remote dependencies against a flattened configuration.
pub struct Loader {
    connectors: HashMap<String, Arc<dyn Connector>>,
    flat: BTreeMap<String, ServiceOptions>,
    options: ClientOptions,
}

impl Loader {
    /// Flattens the configuration up front; a malformed config fails here
    /// rather than at first use.
    pub fn new(
        connectors: impl IntoIterator<Item = (impl Into<String>, Arc<dyn Connector>)>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            connectors: connectors
                .into_iter()
                .map(|(name, connector)| (name.into(), connector))
                .collect(),
            flat: config.flatten()?,
            options: ClientOptions::new(),
        })
    }

    /// Session options applied to every negotiated proxy.
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Connects and negotiates a proxy for one configured service.
    pub async fn remote(&self, name: &str) -> Result<Arc<dyn Remote>> {
        let entry = self
            .flat
            .get(name)
            .ok_or_else(|| LoadError::UnknownService(name.to_string()))?;
        let connector = self
            .connectors
            .get(&entry.transport)
            .ok_or_else(|| LoadError::UnknownTransport(entry.transport.clone()))?;

        debug!(service = name, transport = %entry.transport, "connecting");
        let transport = connector.connect(&entry.options).await?;
        let proxy = client::negotiate(transport, self.options.clone()).await?;
        Ok(Arc::new(proxy))
    }

    /// Negotiates proxies for the named services, one at a time, and
    /// returns them as a registry. A consumer-only process uses this to
    /// reach its remotes.
    pub async fn connect(&self, names: &[&str]) -> Result<Registry> {
        let mut registry = Registry::new();
        for name in names {
            registry.insert(*name, self.remote(name).await?);
        }
        Ok(registry)
    }

    /// Instantiates a service: negotiates its declared remote
    /// dependencies in order and hands them to the factory, yielding the
    /// procedure tree to bind.
    pub async fn load<F>(&self, dependencies: &[&str], factory: F) -> Result<ProcTree>
    where
        F: FnOnce(Vec<Arc<dyn Remote>>) -> ProcTree,
    {
        let mut deps = Vec::with_capacity(dependencies.len());
        for name in dependencies {
            deps.push(self.remote(name).await?);
        }
        Ok(factory(deps))
    }
}
