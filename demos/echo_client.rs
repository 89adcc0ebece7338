//! Echo client - lazy retries, route proxies and remote errors.
//!
//! Start `echo_server` first, then:
//!
//! ```text
//! cargo run --example echo_client -- tcp://127.0.0.1:5555
//! ```

use std::time::Duration;

use routewire::{Client, Error, Map, RetryPolicy, StaticExtension, Value};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:5555".to_string());

    let mut client = Client::builder(endpoint)
        .retry(RetryPolicy::new(3, Duration::from_millis(500)))
        .middleware(StaticExtension::new("t", "demo-token"))
        .build()?;

    let echoed = client
        .call("", "echo", vec![Value::from("hello")], Map::new())
        .await?;
    info!(?echoed, "echo");

    let upper = client
        .route("text")
        .call("upper", vec![Value::from("shout")], Map::new())
        .await?;
    info!(?upper, "text.upper");

    let mut counter = client.route("counter");
    let mut kwargs = Map::new();
    kwargs.insert("n".to_string(), Value::Int(32));
    let next = counter.call("next", Vec::new(), kwargs).await?;
    info!(?next, "counter.next");
    info!(doc = ?counter.doc("next").await?, "counter.doc");

    info!(methods = ?client.dir().await?, routes = ?client.routes().await?, "root");

    match client.call("", "missing", Vec::new(), Map::new()).await {
        Err(Error::Remote(fault)) => warn!(kind = fault.kind(), message = fault.message(), "remote fault"),
        Err(Error::ServerUnavailable { attempts }) => warn!(attempts, "server unavailable"),
        other => info!(?other, "unexpected reply"),
    }

    Ok(())
}
