//! # Configuration
//!
//! Connection configuration arrives grouped by transport type:
//!
//! ```json
//! { "tcp": { "math": { "host": "localhost", "port": 3001 } } }
//! ```
//!
//! Wiring wants it keyed by service name, each options object tagged with
//! the transport type it came from so the right connector can be chosen
//! per dependency. `flatten` performs that inversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw configuration: transport type -> service name -> options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    types: BTreeMap<String, BTreeMap<String, Value>>,
}

/// A flattened entry: the options for one service plus the transport
/// type that provides it.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceOptions {
    pub transport: String,
    pub options: Value,
}

/// Configuration shape failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One service name appeared under two transport types; connecting
    /// to it would be ambiguous.
    Duplicate {
        service: String,
        first: String,
        second: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate {
                service,
                first,
                second,
            } => write!(
                f,
                "Service '{}' is configured under both '{}' and '{}'",
                service, first, second
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(
        &mut self,
        transport: impl Into<String>,
        service: impl Into<String>,
        options: Value,
    ) {
        self.types
            .entry(transport.into())
            .or_default()
            .insert(service.into(), options);
    }

    /// Inverts the grouping into service name -> tagged options.
    pub fn flatten(&self) -> std::result::Result<BTreeMap<String, ServiceOptions>, ConfigError> {
        let mut flat: BTreeMap<String, ServiceOptions> = BTreeMap::new();
        for (transport, services) in &self.types {
            for (service, options) in services {
                if let Some(existing) = flat.get(service) {
                    return Err(ConfigError::Duplicate {
                        service: service.clone(),
                        first: existing.transport.clone(),
                        second: transport.clone(),
                    });
                }
                flat.insert(
                    service.clone(),
                    ServiceOptions {
                        transport: transport.clone(),
                        options: options.clone(),
                    },
                );
            }
        }
        Ok(flat)
    }
}
