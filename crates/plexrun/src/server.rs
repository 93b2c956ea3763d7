//! # Session Server
//!
//! Binds a procedure tree to an inbound-message handler. The tree is
//! walked exactly once, at bind time: leaves are indexed by dot-path and
//! the listing response body is cached, so answering `ls` is a string
//! copy and resolving a call path is a table lookup.
//!
//! Dispatch is safe to invoke concurrently; procedures may run with
//! overlapping lifetimes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, trace};

use plexrpc::{Correlation, ErrEncoder, ExitEncoder, Frame, InitEncoder, ResEncoder};

use crate::proc::{CallContext, Outcome, ProcTree, Procedure};

/// A bound procedure tree, ready to answer dispatched messages.
pub struct Server {
    table: HashMap<String, Arc<dyn Procedure>>,
    listing_json: String,
}

impl Server {
    /// Indexes the tree and caches its listing. The tree must not change
    /// afterwards; binding a service happens after it is fully resolved.
    pub fn bind(tree: &ProcTree) -> plexrpc::Result<Self> {
        let listing_json = tree.listing().to_json()?;
        let table: HashMap<String, Arc<dyn Procedure>> = tree.paths().into_iter().collect();
        debug!(procedures = table.len(), "bound procedure tree");
        Ok(Self {
            table,
            listing_json,
        })
    }

    /// Handles one inbound message and produces the response body.
    ///
    /// Every path through here answers: malformed or unknown input gets a
    /// generic `err` rather than silence.
    pub async fn dispatch(&self, fields: &[String]) -> String {
        match Frame::parse(fields) {
            Ok(Frame::Ls { stamp, nonce }) => {
                InitEncoder::new(Correlation::echo(stamp, nonce), &self.listing_json).encode()
            }
            Ok(Frame::Call {
                stamp,
                nonce,
                path,
                args,
                implicits,
            }) => {
                self.dispatch_call(Correlation::echo(stamp, nonce), path, args, implicits)
                    .await
            }
            _ => Self::unprocessable(fields),
        }
    }

    async fn dispatch_call(
        &self,
        correlation: Correlation,
        path: &str,
        args_json: &str,
        implicits_json: Option<&str>,
    ) -> String {
        let Some(proc) = self.table.get(path) else {
            return ErrEncoder::encode_message(
                correlation,
                &format!("Procedure {} does not exist", path),
            );
        };

        let args: Vec<Value> = match serde_json::from_str(args_json) {
            Ok(args) => args,
            Err(e) => {
                return ErrEncoder::encode_message(
                    correlation,
                    &format!("Malformed argument payload: {}", e),
                );
            }
        };

        let ctx: CallContext = match implicits_json {
            None => CallContext::new(),
            Some(json) => match serde_json::from_str(json) {
                Ok(ctx) => ctx,
                Err(e) => {
                    return ErrEncoder::encode_message(
                        correlation,
                        &format!("Malformed implicit-context payload: {}", e),
                    );
                }
            },
        };

        trace!(path, "dispatching call");
        match proc.invoke(&ctx, args).await {
            Ok(Outcome::Value(value)) => ResEncoder::new(correlation, &value).encode(),
            Ok(Outcome::Exit(reason)) => {
                let reason = Value::String(reason);
                ExitEncoder::new(correlation, &reason).encode()
            }
            Err(fault) => ErrEncoder::encode_message(correlation, fault.message()),
        }
    }

    fn unprocessable(fields: &[String]) -> String {
        let stamp = fields.get(1).map(String::as_str).unwrap_or("");
        let nonce = fields.get(2).map(String::as_str).unwrap_or("");
        let payload = json!({
            "message": "Could not process request.",
            "received": fields.join("\n"),
        });
        ErrEncoder::new(Correlation::echo(stamp, nonce), &payload).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::Fault;
    use plexrpc::{CallEncoder, LsEncoder, split_fields};

    fn procs() -> ProcTree {
        ProcTree::builder()
            .func("add", 2, |_ctx, args| {
                let a = args.first().and_then(Value::as_i64).unwrap_or(0);
                let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(Outcome::Value(json!(a + b)))
            })
            .async_func("multiply", 2, |_ctx, args| async move {
                let a = args.first().and_then(Value::as_i64).unwrap_or(0);
                let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(Outcome::Value(json!(a * b)))
            })
            .scope(
                "foo",
                ProcTree::builder()
                    .func("bar", 0, |_ctx, _args| Ok(Outcome::Value(json!("foobar"))))
                    .func("boom", 0, |_ctx, _args| Err(Fault::new("BOOM")))
                    .build(),
            )
            .build()
    }

    async fn call(srv: &Server, path: &str, args: Vec<Value>) -> Vec<String> {
        let body = CallEncoder::new(path, &args, None).encode();
        split_fields(&srv.dispatch(&split_fields(&body)).await)
    }

    #[tokio::test]
    async fn test_ls_answers_cached_init() {
        let srv = Server::bind(&procs()).unwrap();
        let res = srv.dispatch(&split_fields(&LsEncoder::new().encode())).await;
        assert!(res.starts_with("init\n"));
        assert!(res.contains("add"));
        assert!(res.contains('2'));
        assert!(!res.contains("foobar"));
    }

    #[tokio::test]
    async fn test_call_sync_procedure() {
        let srv = Server::bind(&procs()).unwrap();
        let fields = call(&srv, "add", vec![json!(1), json!(2)]).await;
        assert_eq!(fields[0], "res");
        assert_eq!(fields[3], "3");
    }

    #[tokio::test]
    async fn test_call_async_procedure() {
        let srv = Server::bind(&procs()).unwrap();
        let fields = call(&srv, "multiply", vec![json!(2), json!(2)]).await;
        assert_eq!(fields[0], "res");
        assert_eq!(fields[3], "4");
    }

    #[tokio::test]
    async fn test_call_resolves_namespaces() {
        let srv = Server::bind(&procs()).unwrap();
        let fields = call(&srv, "foo.bar", vec![]).await;
        assert_eq!(fields[0], "res");
        assert_eq!(fields[3], "\"foobar\"");
    }

    #[tokio::test]
    async fn test_missing_procedure_names_the_path() {
        let srv = Server::bind(&procs()).unwrap();
        let fields = call(&srv, "DOOM", vec![]).await;
        assert_eq!(fields[0], "err");
        assert!(fields[3].contains("DOOM"));
        assert!(fields[3].contains("does not exist"));
    }

    #[tokio::test]
    async fn test_fault_becomes_err_response() {
        let srv = Server::bind(&procs()).unwrap();
        let fields = call(&srv, "foo.boom", vec![]).await;
        assert_eq!(fields[0], "err");
        assert_eq!(fields[3], "\"BOOM\"");
    }

    #[tokio::test]
    async fn test_exit_outcome_becomes_exit_response() {
        let tree = ProcTree::builder()
            .func("quit", 0, |_ctx, _args| {
                Ok(Outcome::Exit("goodbye".to_string()))
            })
            .build();
        let srv = Server::bind(&tree).unwrap();
        let fields = call(&srv, "quit", vec![]).await;
        assert_eq!(fields[0], "exit");
        assert_eq!(fields[3], "\"goodbye\"");
    }

    #[tokio::test]
    async fn test_garbage_gets_generic_err() {
        let srv = Server::bind(&procs()).unwrap();
        let res = srv.dispatch(&split_fields("booya")).await;
        assert!(res.starts_with("err\n"));
        assert!(res.contains("Could not process request."));
    }

    #[tokio::test]
    async fn test_implicits_reach_the_procedure() {
        let tree = ProcTree::builder()
            .func("who", 0, |ctx, _args| {
                let user = ctx.get("user").cloned().unwrap_or(Value::Null);
                Ok(Outcome::Value(user))
            })
            .build();
        let srv = Server::bind(&tree).unwrap();

        let body = CallEncoder::new("who", &[], Some("{\"user\":\"u1\"}")).encode();
        let fields = split_fields(&srv.dispatch(&split_fields(&body)).await);
        assert_eq!(fields[0], "res");
        assert_eq!(fields[3], "\"u1\"");
    }
}
