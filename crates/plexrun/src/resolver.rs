//! # Service Resolver
//!
//! Wires named service factories into a fully resolved mapping. Entries
//! are either already-resolved values or descriptors declaring the
//! dependency names their factory requires. Resolution repeatedly picks a
//! descriptor whose dependencies are all resolved, invokes its factory
//! with them in declared order, and awaits asynchronous factories before
//! moving on.
//!
//! ## Invariants
//!
//! - A name lives in exactly one of pending/resolved at any time and
//!   moves from pending to resolved exactly once.
//! - A factory runs only after every one of its declared dependencies is
//!   resolved; when nothing can run and entries remain, resolution fails
//!   before invoking anything else, naming every unmet dependency.
//! - The loop is an iterative fixed point; graph size never grows the
//!   call stack.
//!
//! Ordering among independently satisfiable entries follows scan order
//! and is not guaranteed stable across runs.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use tracing::debug;

/// A factory's output: an immediate value, or a suspension the resolver
/// awaits before continuing.
pub enum Resolution<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> Resolution<T> {
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    pub fn pending(fut: impl Future<Output = T> + Send + 'static) -> Self {
        Self::Pending(Box::pin(fut))
    }
}

type Factory<T> = Box<dyn FnOnce(Vec<T>) -> Resolution<T> + Send>;

/// A named factory plus the dependencies it requires, not yet invoked.
pub struct Service<T> {
    dependencies: Vec<String>,
    factory: Factory<T>,
}

impl<T> Service<T> {
    pub fn new<F>(dependencies: impl IntoIterator<Item = impl Into<String>>, factory: F) -> Self
    where
        F: FnOnce(Vec<T>) -> Resolution<T> + Send + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            factory: Box::new(factory),
        }
    }

    /// A descriptor whose factory produces its value immediately.
    pub fn from_fn<F>(dependencies: impl IntoIterator<Item = impl Into<String>>, f: F) -> Self
    where
        F: FnOnce(Vec<T>) -> T + Send + 'static,
    {
        Self::new(dependencies, move |deps| Resolution::Ready(f(deps)))
    }

    /// A descriptor whose factory suspends before producing its value.
    pub fn from_future<F, Fut>(
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        f: F,
    ) -> Self
    where
        F: FnOnce(Vec<T>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::new(dependencies, move |deps| Resolution::pending(f(deps)))
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// One input to resolution: a value that needs no work, or a service
/// descriptor still to be invoked.
pub enum Entry<T> {
    Value(T),
    Service(Service<T>),
}

/// Resolution failure. Nothing is partially applied: the mapping that
/// produced this error had no factory of the stuck set invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No pending entry could be satisfied. Carries every dependency
    /// name still unmet across all pending entries, deduplicated; this
    /// reports absent names and cycles uniformly.
    MissingDependencies(Vec<String>),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDependencies(names) => {
                write!(f, "Unresolvable dependencies: {}", names.join(", "))
            }
        }
    }
}

impl std::error::Error for ResolveError {}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolves a mapping of entries into a mapping of values.
///
/// Already-resolved values seed the result; descriptors are invoked once
/// their dependencies exist, receiving them in declared order. Factories
/// that suspend are awaited before the loop continues, so a dependent
/// never observes a half-built dependency.
pub async fn resolve<T: Clone>(entries: BTreeMap<String, Entry<T>>) -> Result<BTreeMap<String, T>> {
    let mut resolved: BTreeMap<String, T> = BTreeMap::new();
    let mut pending: Vec<(String, Service<T>)> = Vec::new();

    for (name, entry) in entries {
        match entry {
            Entry::Value(value) => {
                resolved.insert(name, value);
            }
            Entry::Service(service) => pending.push((name, service)),
        }
    }

    while !pending.is_empty() {
        let next = pending.iter().position(|(_, service)| {
            service
                .dependencies
                .iter()
                .all(|dep| resolved.contains_key(dep))
        });

        let Some(next) = next else {
            let mut missing: Vec<String> = pending
                .iter()
                .flat_map(|(_, service)| service.dependencies.iter())
                .filter(|dep| !resolved.contains_key(*dep))
                .cloned()
                .collect();
            missing.sort();
            missing.dedup();
            return Err(ResolveError::MissingDependencies(missing));
        };

        let (name, service) = pending.remove(next);
        let deps: Vec<T> = service
            .dependencies
            .iter()
            .filter_map(|dep| resolved.get(dep).cloned())
            .collect();

        debug!(service = %name, "resolving");
        let value = match (service.factory)(deps) {
            Resolution::Ready(value) => value,
            Resolution::Pending(fut) => fut.await,
        };
        resolved.insert(name, value);
    }

    Ok(resolved)
}
