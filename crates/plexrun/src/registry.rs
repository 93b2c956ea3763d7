//! # Service Registry
//!
//! A frozen name-to-surface map. The loader populates one during wiring;
//! after that it is read-only, so serving code can share it freely
//! without coordination.

use std::collections::HashMap;
use std::sync::Arc;

use crate::remote::Remote;

/// Named callable surfaces, frozen after wiring.
#[derive(Clone, Default)]
pub struct Registry {
    services: HashMap<String, Arc<dyn Remote>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter(
        services: impl IntoIterator<Item = (impl Into<String>, Arc<dyn Remote>)>,
    ) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|(name, service)| (name.into(), service))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, service: Arc<dyn Remote>) {
        self.services.insert(name.into(), service);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Remote>> {
        self.services.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
