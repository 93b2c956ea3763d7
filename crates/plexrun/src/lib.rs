//! # PlexRun
//!
//! Sessions and wiring for plexus services: procedure trees exposed over
//! the plexrpc protocol, proxies negotiated from peers, and a resolver
//! that assembles local service graphs by dependency injection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use plexrun::proc::{Outcome, ProcTree};
//! use plexrun::server::Server;
//! use plexrun::client::{self, ClientOptions};
//! use plexrun::net::{self, TcpTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve a tree...
//! let tree = ProcTree::builder()
//!     .func("add", 2, |_ctx, args| {
//!         let a = args[0].as_i64().unwrap_or(0);
//!         let b = args[1].as_i64().unwrap_or(0);
//!         Ok(Outcome::Value(json!(a + b)))
//!     })
//!     .build();
//! let listener = net::serve("127.0.0.1:3001", Arc::new(Server::bind(&tree)?)).await?;
//!
//! // ...and call it from elsewhere.
//! let transport = Arc::new(TcpTransport::new("127.0.0.1:3001"));
//! let math = client::negotiate(transport, ClientOptions::new()).await?;
//! let sum = math.invoke("add", vec![json!(1), json!(2)]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod load;
pub mod mock;
pub mod net;
pub mod proc;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod server;
pub mod transport;


// Re-exports for convenience
pub use client::{ClientOptions, Proxy, negotiate};
pub use proc::{CallContext, Outcome, ProcTree};
pub use registry::Registry;
pub use remote::{CallError, Remote};
pub use resolver::{Entry, Resolution, Service, resolve};
pub use server::Server;
pub use transport::Transport;
