//! Echo server - routes, a service table and middleware.
//!
//! This example demonstrates:
//! - Registering methods at the root and under nested routes
//! - Mounting a service's method table
//! - Introspection and request logging middleware
//!
//! ```text
//! RUST_LOG=debug cargo run --example echo_server -- tcp://127.0.0.1:5555
//! ```

use routewire::{
    IntrospectionMiddleware, LoggingMiddleware, MethodResult, MethodTable, Params, Request,
    Server, Service, Value,
};
use tracing::info;

struct Counter {
    step: i64,
}

impl Counter {
    fn next(&self, _req: &Request, params: Params<'_>) -> MethodResult {
        Ok(Value::Int(params.i64(0, "n")? + self.step))
    }

    fn describe(&self, req: &Request, _params: Params<'_>) -> MethodResult {
        Ok(Value::from(serde_json::json!({
            "step": self.step,
            "caller": req.id,
        })))
    }
}

impl Service for Counter {
    fn method_table() -> MethodTable<Self> {
        MethodTable::new()
            .documented("next", "Return n plus the configured step.", Counter::next)
            .method("describe", Counter::describe)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:5555".to_string());

    let server = Server::builder()
        .documented("", "echo", "Return the argument unchanged.", |_, params| {
            params.required(0, "value").cloned()
        })
        .route_method("text", "upper", |_, params| {
            Ok(Value::from(params.str(0, "s")?.to_uppercase()))
        })
        .service("counter", Counter { step: 10 })
        .middleware(LoggingMiddleware)
        .middleware(IntrospectionMiddleware)
        .bind(&endpoint)
        .await?;

    info!(endpoints = ?server.endpoints(), "echo server ready");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("echo server stopped");
    Ok(())
}
