//! Serves a rectangle service on 127.0.0.1:3002, consuming the math
//! service from `math_server` over TCP.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Value, json};

use plexrun::config::Config;
use plexrun::load::{Connector, Loader};
use plexrun::net::{self, TcpConnector};
use plexrun::proc::{Fault, Outcome, ProcTree};
use plexrun::remote::Remote;
use plexrun::server::Server;

fn rectangle(math: Arc<dyn Remote>) -> ProcTree {
    let m_surface = math.clone();
    let m_perimeter = math;
    ProcTree::builder()
        .async_func("surface", 2, move |_ctx, args| {
            let math = m_surface.clone();
            async move {
                math.invoke("multiply", args)
                    .await
                    .map(Outcome::Value)
                    .map_err(|e| Fault::new(e.to_string()))
            }
        })
        .async_func("perimeter", 2, move |_ctx, args| {
            let math = m_perimeter.clone();
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
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = Config::new();
    config.insert("tcp", "math", json!({"host": "127.0.0.1", "port": 3001}));

    let connectors = [("tcp", Arc::new(TcpConnector) as Arc<dyn Connector>)];
    let loader = Loader::new(connectors, &config)?;

    let tree = loader
        .load(&["math"], |mut deps| rectangle(deps.remove(0)))
        .await?;
    let listener = net::serve("127.0.0.1:3002", Arc::new(Server::bind(&tree)?)).await?;
    println!("rectangle service listening on {}", listener.local_addr());

    tokio::signal::ctrl_c().await?;
    listener.close();
    Ok(())
}
