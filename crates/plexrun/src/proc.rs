//! # Procedure Trees
//!
//! A service's callable surface: a recursively nested mapping from name
//! to either a procedure (leaf) or a nested namespace. Only leaves are
//! invocable; interior nodes exist purely to organize.
//!
//! ## Invariants
//!
//! - A tree is immutable once built; servers index it and cache its
//!   listing on that assumption.
//! - Every leaf declares an arity, preserved through listings and
//!   proxies.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use plexrpc::{Listing, ListingNode};

/// Contextual data transmitted alongside a call and handed to the
/// procedure explicitly. Empty for calls that attach none.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallContext {
    entries: BTreeMap<String, Value>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

/// What a procedure produced: a plain value, or a signal that the session
/// should terminate after this response.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Value(Value),
    Exit(String),
}

/// A failure raised by a procedure. Serialized into an `err` response
/// when the procedure ran on behalf of a remote caller.
#[derive(Clone, Debug)]
pub struct Fault {
    message: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Fault {}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub type ProcResult = std::result::Result<Outcome, Fault>;

/// A callable leaf: declares its arity and runs with an explicit call
/// context. Implementations must tolerate concurrent invocation.
#[async_trait::async_trait]
pub trait Procedure: Send + Sync {
    fn arity(&self) -> usize;

    async fn invoke(&self, ctx: &CallContext, args: Vec<Value>) -> ProcResult;
}

struct SyncProc<F> {
    arity: usize,
    f: F,
}

#[async_trait::async_trait]
impl<F> Procedure for SyncProc<F>
where
    F: Fn(&CallContext, Vec<Value>) -> ProcResult + Send + Sync,
{
    fn arity(&self) -> usize {
        self.arity
    }

    async fn invoke(&self, ctx: &CallContext, args: Vec<Value>) -> ProcResult {
        (self.f)(ctx, args)
    }
}

type BoxedProcFn =
    Box<dyn Fn(CallContext, Vec<Value>) -> BoxFuture<'static, ProcResult> + Send + Sync>;

struct AsyncProc {
    arity: usize,
    f: BoxedProcFn,
}

#[async_trait::async_trait]
impl Procedure for AsyncProc {
    fn arity(&self) -> usize {
        self.arity
    }

    async fn invoke(&self, ctx: &CallContext, args: Vec<Value>) -> ProcResult {
        (self.f)(ctx.clone(), args).await
    }
}

/// Wraps a synchronous closure as a procedure with the declared arity.
pub fn sync_proc<F>(arity: usize, f: F) -> Arc<dyn Procedure>
where
    F: Fn(&CallContext, Vec<Value>) -> ProcResult + Send + Sync + 'static,
{
    Arc::new(SyncProc { arity, f })
}

/// Wraps a future-returning closure as a procedure with the declared
/// arity.
pub fn async_proc<F, Fut>(arity: usize, f: F) -> Arc<dyn Procedure>
where
    F: Fn(CallContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcResult> + Send + 'static,
{
    Arc::new(AsyncProc {
        arity,
        f: Box::new(move |ctx, args| -> BoxFuture<'static, ProcResult> {
            Box::pin(f(ctx, args))
        }),
    })
}

/// One entry in a tree: a callable leaf or a nested namespace.
#[derive(Clone)]
pub enum Node {
    Proc(Arc<dyn Procedure>),
    Scope(ProcTree),
}

/// Failures from invoking a tree entry directly.
#[derive(Debug)]
pub enum InvokeError {
    /// No leaf lives at the given dot-path.
    NoSuchProcedure(String),
    /// The leaf ran and failed.
    Fault(Fault),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchProcedure(path) => write!(f, "Procedure {} does not exist", path),
            Self::Fault(fault) => write!(f, "{}", fault),
        }
    }
}

impl std::error::Error for InvokeError {}

/// A nested mapping from name to procedure or sub-tree.
#[derive(Clone, Default)]
pub struct ProcTree {
    nodes: BTreeMap<String, Node>,
}

impl ProcTree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks a dot-separated path down to a leaf.
    pub fn lookup(&self, path: &str) -> Option<&Arc<dyn Procedure>> {
        let mut tree = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match tree.nodes.get(segment)? {
                Node::Proc(proc) => {
                    return if segments.peek().is_none() {
                        Some(proc)
                    } else {
                        None
                    };
                }
                Node::Scope(sub) => tree = sub,
            }
        }
        None
    }

    /// Invokes the leaf at `path` directly, in-process.
    pub async fn invoke(
        &self,
        path: &str,
        ctx: &CallContext,
        args: Vec<Value>,
    ) -> std::result::Result<Outcome, InvokeError> {
        let proc = self
            .lookup(path)
            .ok_or_else(|| InvokeError::NoSuchProcedure(path.to_string()))?;
        proc.invoke(ctx, args).await.map_err(InvokeError::Fault)
    }

    /// The arity-only mirror of this tree, as transmitted in `init`.
    pub fn listing(&self) -> Listing {
        let mut listing = Listing::new();
        for (name, node) in &self.nodes {
            let entry = match node {
                Node::Proc(proc) => ListingNode::Arity(proc.arity()),
                Node::Scope(sub) => ListingNode::Scope(sub.listing()),
            };
            listing.insert(name.clone(), entry);
        }
        listing
    }

    /// Flattens the tree into (dot-path, leaf) pairs.
    pub fn paths(&self) -> Vec<(String, Arc<dyn Procedure>)> {
        let mut out = Vec::new();
        self.collect_paths(None, &mut out);
        out
    }

    fn collect_paths(&self, prefix: Option<&str>, out: &mut Vec<(String, Arc<dyn Procedure>)>) {
        for (name, node) in &self.nodes {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };
            match node {
                Node::Proc(proc) => out.push((path, proc.clone())),
                Node::Scope(sub) => sub.collect_paths(Some(&path), out),
            }
        }
    }
}

/// Fluent construction of procedure trees.
pub struct TreeBuilder {
    nodes: BTreeMap<String, Node>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Adds a synchronous procedure leaf.
    pub fn func<F>(mut self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&CallContext, Vec<Value>) -> ProcResult + Send + Sync + 'static,
    {
        self.nodes.insert(name.into(), Node::Proc(sync_proc(arity, f)));
        self
    }

    /// Adds a future-returning procedure leaf.
    pub fn async_func<F, Fut>(mut self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(CallContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.nodes
            .insert(name.into(), Node::Proc(async_proc(arity, f)));
        self
    }

    /// Adds an already-built procedure leaf.
    pub fn proc(mut self, name: impl Into<String>, proc: Arc<dyn Procedure>) -> Self {
        self.nodes.insert(name.into(), Node::Proc(proc));
        self
    }

    /// Nests a sub-tree as a namespace.
    pub fn scope(mut self, name: impl Into<String>, tree: ProcTree) -> Self {
        self.nodes.insert(name.into(), Node::Scope(tree));
        self
    }

    pub fn build(self) -> ProcTree {
        ProcTree { nodes: self.nodes }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
