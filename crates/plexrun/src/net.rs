//! # TCP Bindings
//!
//! The bundled concrete transport: one connection per request. The
//! requester connects, writes the encoded message, half-closes its write
//! side, and reads the response until end of stream; the listener does
//! the mirror image. End of stream is the frame boundary, so the message
//! delimiter stays free for fields.
//!
//! No pooling, no retry, no reconnection. A transport failure surfaces to
//! the caller as-is.

use std::net::SocketAddr;

use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use plexrpc::split_fields;

use crate::load::Connector;
use crate::server::Server;
use crate::transport::{Error, Result, Transport};

/// A request transport addressing one TCP peer.
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn request(&self, body: String) -> Result<Vec<String>> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::ConnectionLost(e.to_string()))?;

        stream
            .write_all(body.as_bytes())
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        stream
            .shutdown()
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        Ok(split_fields(&response))
    }
}

/// Connector for `tcp`-typed configuration entries.
///
/// Options shape: `{"host": "localhost", "port": 3001}`.
pub struct TcpConnector;

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, options: &Value) -> Result<Arc<dyn Transport>> {
        let host = options
            .get("host")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Rejected("Missing 'host' in tcp options".to_string()))?;
        let port = options
            .get("port")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Rejected("Missing 'port' in tcp options".to_string()))?;

        Ok(Arc::new(TcpTransport::new(format!("{}:{}", host, port))))
    }
}

/// A running listener; dropping the handle leaves it running, `close`
/// stops the accept loop.
pub struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn close(self) {
        let _ = self.shutdown.send(());
    }
}

/// Binds `addr` and serves the given session server: every accepted
/// connection carries exactly one request/response cycle.
pub async fn serve(addr: &str, server: Arc<Server>) -> Result<Listener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Io(e.to_string()))?;
    let local = listener
        .local_addr()
        .map_err(|e| Error::Io(e.to_string()))?;
    debug!(addr = %local, "listening");

    let (shutdown, mut rx) = oneshot::channel();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut rx => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _peer)) => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, server).await {
                                warn!(error = %e, "request handling failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
    });

    Ok(Listener {
        addr: local,
        shutdown,
    })
}

async fn handle_connection(mut stream: TcpStream, server: Arc<Server>) -> std::io::Result<()> {
    let mut body = String::new();
    stream.read_to_string(&mut body).await?;

    let fields = split_fields(&body);
    let response = server.dispatch(&fields).await;

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::client::{self, ClientOptions};
    use crate::proc::{Outcome, ProcTree};

    #[tokio::test]
    async fn test_request_response_over_sockets() {
        let tree = ProcTree::builder()
            .func("echo", 1, |_ctx, mut args| {
                Ok(Outcome::Value(args.pop().unwrap_or(Value::Null)))
            })
            .build();
        let server = Arc::new(Server::bind(&tree).unwrap());
        let listener = serve("127.0.0.1:0", server).await.unwrap();

        let transport = Arc::new(TcpTransport::new(listener.local_addr().to_string()));
        let proxy = client::negotiate(transport, ClientOptions::new())
            .await
            .unwrap();

        let out = proxy.invoke("echo", vec![json!("over tcp")]).await.unwrap();
        assert_eq!(out, json!("over tcp"));

        listener.close();
    }

    #[tokio::test]
    async fn test_connection_refused_propagates() {
        let transport = TcpTransport::new("127.0.0.1:1");
        let err = transport.request("ls\n0\nx".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
    }
}
