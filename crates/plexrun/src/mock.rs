//! # Mock/Test Harness
//!
//! Doubles for exercising services, the resolver, and the protocol
//! without real I/O:
//!
//! - [`remote`] wraps an in-process procedure tree as a [`Remote`], so a
//!   locally defined service injects wherever a network proxy would;
//! - [`cluster`] fixed-points a set of leaf surfaces plus in-process
//!   descriptors, auto-wrapping every resolved output;
//! - [`loopback`] routes a transport straight into a bound server;
//! - [`CountingTransport`] makes "no request was issued" observable;
//! - [`sequence`] scripts a leaf to return queued values in order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use plexrpc::split_fields;

use crate::proc::{CallContext, InvokeError, Outcome, ProcTree, Procedure};
use crate::remote::{CallError, Remote};
use crate::resolver::{self, Entry, Resolution, ResolveError, Service};
use crate::server::Server;
use crate::transport::{self, Transport};

struct LocalRemote {
    tree: Arc<ProcTree>,
    arities: HashMap<String, usize>,
}

#[async_trait::async_trait]
impl Remote for LocalRemote {
    fn arity(&self, path: &str) -> Option<usize> {
        self.arities.get(path).copied()
    }

    async fn invoke(&self, path: &str, args: Vec<Value>) -> crate::remote::Result<Value> {
        match self.tree.invoke(path, &CallContext::new(), args).await {
            Ok(Outcome::Value(value)) => Ok(value),
            // A mocked service asking to exit has no session to end.
            Ok(Outcome::Exit(reason)) => Err(CallError::Remote(reason)),
            Err(InvokeError::NoSuchProcedure(path)) => Err(CallError::NoSuchProcedure(path)),
            Err(InvokeError::Fault(fault)) => Err(CallError::Remote(fault.message().to_string())),
        }
    }
}

/// Wraps a procedure tree so every leaf is reached through the same
/// asynchronous surface a network proxy presents. Arity and shape are
/// preserved.
pub fn remote(tree: Arc<ProcTree>) -> Arc<dyn Remote> {
    let arities = tree.listing().paths().into_iter().collect();
    Arc::new(LocalRemote { tree, arities })
}

/// An in-process service descriptor for [`cluster`]: dependency names
/// plus a factory producing the service's procedure tree.
pub struct MockService {
    dependencies: Vec<String>,
    factory: Box<dyn FnOnce(Vec<Arc<dyn Remote>>) -> ProcTree + Send>,
}

impl MockService {
    pub fn new<F>(dependencies: impl IntoIterator<Item = impl Into<String>>, factory: F) -> Self
    where
        F: FnOnce(Vec<Arc<dyn Remote>>) -> ProcTree + Send + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            factory: Box::new(factory),
        }
    }
}

/// Assembles a partial cluster: `leafs` are surfaces taken as-is (real
/// proxies or [`remote`]-wrapped trees), `services` are in-process
/// descriptors resolved against them. Every resolved output is wrapped
/// like a network remote. Fails when no further progress can be made,
/// naming every unmet dependency.
pub async fn cluster(
    leafs: BTreeMap<String, Arc<dyn Remote>>,
    services: BTreeMap<String, MockService>,
) -> std::result::Result<BTreeMap<String, Arc<dyn Remote>>, ResolveError> {
    let mut entries: BTreeMap<String, Entry<Arc<dyn Remote>>> = BTreeMap::new();
    for (name, leaf) in leafs {
        entries.insert(name, Entry::Value(leaf));
    }
    for (name, service) in services {
        let MockService {
            dependencies,
            factory,
        } = service;
        entries.insert(
            name,
            Entry::Service(Service::new(dependencies, move |deps| {
                Resolution::Ready(remote(Arc::new(factory(deps))))
            })),
        );
    }
    resolver::resolve(entries).await
}

struct SequenceProc {
    queue: Mutex<VecDeque<Value>>,
}

#[async_trait::async_trait]
impl Procedure for SequenceProc {
    fn arity(&self) -> usize {
        0
    }

    async fn invoke(&self, _ctx: &CallContext, _args: Vec<Value>) -> crate::proc::ProcResult {
        let next = match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        };
        match next {
            Some(value) => Ok(Outcome::Value(value)),
            None => Err("Sequence exhausted".into()),
        }
    }
}

/// A scripted leaf: returns the given values one per call, in order, and
/// faults once exhausted.
pub fn sequence(values: impl IntoIterator<Item = Value>) -> Arc<dyn Procedure> {
    Arc::new(SequenceProc {
        queue: Mutex::new(values.into_iter().collect()),
    })
}

struct LoopbackTransport {
    server: Arc<Server>,
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn request(&self, body: String) -> transport::Result<Vec<String>> {
        let fields = split_fields(&body);
        let response = self.server.dispatch(&fields).await;
        Ok(split_fields(&response))
    }
}

/// A transport that dispatches straight into a bound server. Full
/// protocol, no sockets.
pub fn loopback(server: Arc<Server>) -> Arc<dyn Transport> {
    Arc::new(LoopbackTransport { server })
}

/// Wraps a transport and counts the requests that actually reach it.
pub struct CountingTransport {
    inner: Arc<dyn Transport>,
    requests: Mutex<usize>,
}

impl CountingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            requests: Mutex::new(0),
        })
    }

    /// How many requests were issued through this transport.
    pub fn requests(&self) -> usize {
        self.requests.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Transport for CountingTransport {
    async fn request(&self, body: String) -> transport::Result<Vec<String>> {
        if let Ok(mut n) = self.requests.lock() {
            *n += 1;
        }
        self.inner.request(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::proc::Fault;

    fn math_tree() -> ProcTree {
        ProcTree::builder()
            .func("add", 2, |_ctx, args| {
                let a = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                let b = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
                Ok(Outcome::Value(json!(a + b)))
            })
            .func("multiply", 2, |_ctx, args| {
                let a = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                let b = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
                Ok(Outcome::Value(json!(a * b)))
            })
            .func("divide", 2, |_ctx, args| {
                let a = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                let b = args.get(1).and_then(Value::as_f64).unwrap_or(1.0);
                Ok(Outcome::Value(json!(a / b)))
            })
            .build()
    }

    fn rectangle_service() -> MockService {
        MockService::new(["math"], |deps| {
            let math = deps[0].clone();
            let math2 = math.clone();
            ProcTree::builder()
                .async_func("surface", 2, move |_ctx, args| {
                    let math = math.clone();
                    async move {
                        math.invoke("multiply", args)
                            .await
                            .map(Outcome::Value)
                            .map_err(|e| Fault::new(e.to_string()))
                    }
                })
                .async_func("perimeter", 2, move |_ctx, args| {
                    let math = math2.clone();
                    async move {
                        let w = args.first().cloned().unwrap_or(Value::Null);
                        let h = args.get(1).cloned().unwrap_or(Value::Null);
                        let m1 = math
                            .invoke("multiply", vec![w, json!(2)])
                            .await
                            .map_err(|e| Fault::new(e.to_string()))?;
                        let m2 = math
                            .invoke("multiply", vec![h, json!(2)])
                            .await
                            .map_err(|e| Fault::new(e.to_string()))?;
                        math.invoke("add", vec![m1, m2])
                            .await
                            .map(Outcome::Value)
                            .map_err(|e| Fault::new(e.to_string()))
                    }
                })
                .build()
        })
    }

    #[tokio::test]
    async fn test_mock_remote_preserves_shape_and_arity() {
        let mocked = remote(Arc::new(math_tree()));
        assert_eq!(mocked.arity("add"), Some(2));
        assert_eq!(mocked.arity("missing"), None);

        let sum = mocked.invoke("add", vec![json!(2), json!(3)]).await.unwrap();
        assert_eq!(sum, json!(5.0));
    }

    #[tokio::test]
    async fn test_mocked_service_composes_with_another() {
        let math = remote(Arc::new(math_tree()));
        let MockService { factory, .. } = rectangle_service();
        let rectangle = factory(vec![math]);

        let out = rectangle
            .invoke("surface", &CallContext::new(), vec![json!(2), json!(4)])
            .await
            .unwrap();
        assert_eq!(out, Outcome::Value(json!(8.0)));
    }

    #[tokio::test]
    async fn test_cluster_resolves_leafs_and_branches() {
        let mut leafs: BTreeMap<String, Arc<dyn Remote>> = BTreeMap::new();
        leafs.insert("math".to_string(), remote(Arc::new(math_tree())));

        let mut services = BTreeMap::new();
        services.insert("rectangle".to_string(), rectangle_service());
        services.insert(
            "surface".to_string(),
            MockService::new(["rectangle"], |deps| {
                let rectangle = deps[0].clone();
                ProcTree::builder()
                    .async_func("rectangle", 2, move |_ctx, args| {
                        let rectangle = rectangle.clone();
                        async move {
                            let s = rectangle
                                .invoke("surface", args)
                                .await
                                .map_err(|e| Fault::new(e.to_string()))?;
                            Ok(Outcome::Value(json!(format!(
                                "The rectangle has a surface of: {}",
                                s
                            ))))
                        }
                    })
                    .build()
            }),
        );

        let cluster = cluster(leafs, services).await.unwrap();
        let perimeter = cluster["rectangle"]
            .invoke("perimeter", vec![json!(2), json!(4)])
            .await
            .unwrap();
        assert_eq!(perimeter, json!(12.0));

        let described = cluster["surface"]
            .invoke("rectangle", vec![json!(2), json!(2)])
            .await
            .unwrap();
        let described = described.as_str().unwrap_or_default();
        assert!(described.contains("rectangle"));
        assert!(described.contains('4'));
    }

    #[tokio::test]
    async fn test_cluster_fails_without_progress() {
        let mut services = BTreeMap::new();
        services.insert(
            "rectangle".to_string(),
            MockService::new(["math"], |_deps| ProcTree::default()),
        );

        let err = cluster(BTreeMap::new(), services).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingDependencies(vec!["math".to_string()])
        );
    }

    #[tokio::test]
    async fn test_sequence_returns_values_in_order() {
        let roller = sequence([json!(1), json!(2)]);
        let ctx = CallContext::new();
        assert_eq!(
            roller.invoke(&ctx, vec![]).await.unwrap(),
            Outcome::Value(json!(1))
        );
        assert_eq!(
            roller.invoke(&ctx, vec![]).await.unwrap(),
            Outcome::Value(json!(2))
        );
        assert!(roller.invoke(&ctx, vec![]).await.is_err());
    }
}
