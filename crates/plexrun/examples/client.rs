//! Calls the math and rectangle services from `math_server` and
//! `rectangle_server`.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde_json::json;

use plexrun::config::Config;
use plexrun::load::{Connector, Loader};
use plexrun::net::TcpConnector;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = Config::new();
    config.insert("tcp", "math", json!({"host": "127.0.0.1", "port": 3001}));
    config.insert("tcp", "rectangle", json!({"host": "127.0.0.1", "port": 3002}));

    let connectors = [("tcp", Arc::new(TcpConnector) as Arc<dyn Connector>)];
    let loader = Loader::new(connectors, &config)?;
    let services = loader.connect(&["math", "rectangle"]).await?;

    let math = services
        .get("math")
        .ok_or_else(|| anyhow!("math service missing"))?;
    let rectangle = services
        .get("rectangle")
        .ok_or_else(|| anyhow!("rectangle service missing"))?;

    let sum = math.invoke("add", vec![json!(1), json!(2)]).await?;
    println!("math.add(1, 2) = {}", sum);

    let perimeter = rectangle
        .invoke("perimeter", vec![json!(2), json!(3)])
        .await?;
    println!("rectangle.perimeter(2, 3) = {}", perimeter);

    Ok(())
}
