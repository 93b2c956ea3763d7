//! Serves a math service over TCP on 127.0.0.1:3001.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Value, json};

use plexrun::net;
use plexrun::proc::{Outcome, ProcTree};
use plexrun::server::Server;

fn math() -> ProcTree {
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

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server = Arc::new(Server::bind(&math())?);
    let listener = net::serve("127.0.0.1:3001", server).await?;
    println!("math service listening on {}", listener.local_addr());

    tokio::signal::ctrl_c().await?;
    listener.close();
    Ok(())
}
