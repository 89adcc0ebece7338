//! Server side: registry, middleware and the serving loop.
//!
//! # Example
//!
//! ```no_run
//! use routewire::{IntrospectionMiddleware, Server, Value};
//!
//! # async fn run() -> routewire::Result<()> {
//! let server = Server::builder()
//!     .method("echo", |_, params| params.required(0, "value").cloned())
//!     .route_method("math", "neg", |_, params| Ok(Value::Int(-params.i64(0, "x")?)))
//!     .middleware(IntrospectionMiddleware)
//!     .bind("tcp://127.0.0.1:5555")
//!     .await?;
//!
//! server.run().await
//! # }
//! ```

mod builtin;
mod dispatcher;
mod middleware;

pub use builtin::{IntrospectionMiddleware, LoggingMiddleware, DIR_METHOD, DOC_METHOD, ROUTES_METHOD};
pub use dispatcher::{DispatchState, Dispatcher};
pub use middleware::{Middleware, MiddlewareChain, PostAction, PreAction};

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::fault::Fault;
use crate::protocol::{Request, Response};
use crate::registry::{MethodResult, Params, Registry, RegistryError, RouteNode, Service};
use crate::transport::{Endpoint, ReplySocket, TransportConfig};

/// Builder for [`Server`] and [`Dispatcher`].
///
/// Registration errors are remembered and reported by [`build`](Self::build)
/// or [`bind`](Self::bind), so the chain never needs `?` midway.
#[derive(Debug, Default)]
pub struct ServerBuilder {
    registry: Registry,
    middleware: MiddlewareChain,
    config: TransportConfig,
    error: Option<RegistryError>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method at the root route.
    pub fn method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.route_method("", name, f)
    }

    /// Register a method at `route`, creating the route if needed.
    pub fn route_method<F>(mut self, route: &str, name: &str, f: F) -> Self
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        let result = self.registry.add_method(route, name, f);
        self.record(result)
    }

    /// Register a documented method at `route`.
    pub fn documented<F>(mut self, route: &str, name: &str, doc: &str, f: F) -> Self
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        let result = self.registry.add_documented_method(route, name, doc, f);
        self.record(result)
    }

    /// Mount a service's method table at `route`.
    pub fn service<S: Service>(mut self, route: &str, service: S) -> Self {
        let result = self.registry.add_service(route, service);
        self.record(result)
    }

    /// Attach a prepared route node as child `name` of `parent`.
    pub fn route(mut self, parent: &str, name: &str, node: RouteNode) -> Self {
        let result = self.registry.add_route(parent, name, node);
        self.record(result)
    }

    /// Replace the registry wholesale.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Append a middleware to the chain.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    fn record(mut self, result: std::result::Result<(), RegistryError>) -> Self {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Finish registration without binding.
    ///
    /// # Errors
    ///
    /// The first registration error, if any.
    pub fn build(self) -> Result<Dispatcher> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        Ok(Dispatcher::with_middleware(self.registry, self.middleware))
    }

    /// Bind a single endpoint.
    pub async fn bind(self, endpoint: &str) -> Result<Server> {
        self.bind_all(&[endpoint]).await
    }

    /// Bind every endpoint; requests from all of them share one loop.
    pub async fn bind_all(self, endpoints: &[&str]) -> Result<Server> {
        let config = self.config;
        let dispatcher = self.build()?;

        let mut socket = ReplySocket::new(config);
        for endpoint in endpoints {
            let bound = socket.bind(endpoint).await?;
            info!(endpoint = %bound, "listening");
        }
        Ok(Server::new(dispatcher, socket))
    }
}

/// A bound server: one reply socket driving one dispatcher.
///
/// Requests are handled strictly one at a time.
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    socket: ReplySocket,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn new(dispatcher: Dispatcher, socket: ReplySocket) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            socket,
        }
    }

    /// Endpoints actually bound, with ephemeral ports resolved.
    pub fn endpoints(&self) -> &[Endpoint] {
        self.socket.endpoints()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Receive, dispatch and answer exactly one request.
    ///
    /// A requester that disconnected before its reply is logged and skipped.
    pub async fn run_once(&mut self) -> Result<()> {
        let payload = self.socket.recv().await?;
        self.answer(payload).await
    }

    /// Serve until an error that is not about a single request.
    pub async fn run(mut self) -> Result<()> {
        loop {
            self.run_once().await?;
        }
    }

    /// Serve until `shutdown` completes.
    ///
    /// A request already being dispatched when `shutdown` fires is finished
    /// first.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    return Ok(());
                }
                payload = self.socket.recv() => {
                    let payload = payload?;
                    self.answer(payload).await?;
                }
            }
        }
    }

    async fn answer(&mut self, payload: Bytes) -> Result<()> {
        // Methods are synchronous; keep them off the reactor thread.
        let handler = Arc::clone(&self.dispatcher);
        let reply = tokio::task::spawn_blocking(move || handler.handle_bytes(&payload))
            .await
            .unwrap_or_else(|err| {
                error!(error = %err, "dispatch task failed");
                dispatcher::encode_reply(&Response::Failure(Fault::runtime(err.to_string())))
            });

        match self.socket.send(reply).await {
            Ok(()) => Ok(()),
            Err(Error::ConnectionClosed) => {
                warn!("requester disconnected before its reply was sent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("endpoints", &self.socket.endpoints())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_builder_defers_first_registration_error() {
        let result = Server::builder()
            .method("ping", |_, _| Ok(Value::from("pong")))
            .method("ping", |_, _| Ok(Value::Nil))
            .route_method("bad..path", "x", |_, _| Ok(Value::Nil))
            .build();

        assert!(matches!(
            result,
            Err(Error::Registry(RegistryError::DuplicateMethod(ref name))) if name == "ping"
        ));
    }

    #[test]
    fn test_builder_registers_routes() {
        let dispatcher = Server::builder()
            .method("ping", |_, _| Ok(Value::from("pong")))
            .documented("admin", "stats", "Server statistics.", |_, _| Ok(Value::Nil))
            .build()
            .unwrap();

        let registry = dispatcher.registry();
        assert_eq!(registry.list_methods("").unwrap(), vec!["ping"]);
        assert_eq!(
            registry.resolve_method("admin", "stats").unwrap().doc(),
            Some("Server statistics.")
        );
    }

    #[tokio::test]
    async fn test_bind_reports_resolved_endpoints() {
        let server = Server::builder()
            .bind_all(&["tcp://127.0.0.1:0", "tcp://127.0.0.1:0"])
            .await
            .unwrap();

        assert_eq!(server.endpoints().len(), 2);
        assert_ne!(server.endpoints()[0], server.endpoints()[1]);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_endpoint() {
        let result = Server::builder().bind("http://nope").await;
        assert!(matches!(result, Err(Error::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = Server::builder().bind("tcp://127.0.0.1:0").await.unwrap();
        server.run_until(async {}).await.unwrap();
    }
}
