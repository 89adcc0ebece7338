//! Client side: plain and lazy-retry calls, route proxies.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use routewire::{Client, Map, Value};
//!
//! # async fn run() -> routewire::Result<()> {
//! let mut client = Client::builder("tcp://127.0.0.1:5555")
//!     .retries(3)
//!     .timeout(Duration::from_millis(500))
//!     .build()?;
//!
//! let echoed = client.call("", "echo", vec![Value::from("hi")], Map::new()).await?;
//! let negated = client
//!     .route("math")
//!     .call("neg", vec![Value::Int(4)], Map::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod lazy;
mod middleware;

pub use lazy::{RetryPolicy, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use middleware::{ClientMiddleware, StaticExtension};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::envelope::unpack_envelope;
use crate::protocol::{encode_request, Request, Response};
use crate::server::{DIR_METHOD, DOC_METHOD, ROUTES_METHOD};
use crate::transport::{rand_u64, Endpoint, RequestSocket, TransportConfig};
use crate::value::{Map, Value};

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    let count = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", rand_u64(), count)
}

/// Builder for [`Client`].
///
/// Without a retry setting the client is plain: it sends once and waits for
/// the reply without a timeout.
pub struct ClientBuilder {
    endpoint: String,
    retry: Option<RetryPolicy>,
    middleware: Vec<Arc<dyn ClientMiddleware>>,
    config: TransportConfig,
}

impl ClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry: None,
            middleware: Vec::new(),
            config: TransportConfig::default(),
        }
    }

    /// Use lazy delivery with `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Use lazy delivery with `retries` total attempts.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retry.get_or_insert_with(RetryPolicy::default).retries = retries;
        self
    }

    /// Use lazy delivery waiting `timeout` per attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.retry.get_or_insert_with(RetryPolicy::default).timeout = timeout;
        self
    }

    pub fn middleware(mut self, middleware: impl ClientMiddleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Parse the endpoint and create the client. Nothing connects yet.
    pub fn build(self) -> Result<Client> {
        let endpoint: Endpoint = self.endpoint.parse()?;
        Ok(Client {
            socket: RequestSocket::new(endpoint, self.config),
            retry: self.retry,
            middleware: self.middleware,
        })
    }
}

/// Caller side of the protocol. One call in flight at a time.
pub struct Client {
    socket: RequestSocket,
    retry: Option<RetryPolicy>,
    middleware: Vec<Arc<dyn ClientMiddleware>>,
}

impl Client {
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Plain client for `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        ClientBuilder::new(endpoint).build()
    }

    /// Lazy-retry client for `endpoint`.
    pub fn lazy(endpoint: &str, policy: RetryPolicy) -> Result<Self> {
        ClientBuilder::new(endpoint).retry(policy).build()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.socket.endpoint()
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry
    }

    /// Call `method` at `route`.
    ///
    /// # Errors
    ///
    /// `Error::Remote` carries a fault raised by the server; every other
    /// variant is local.
    pub async fn call(
        &mut self,
        route: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map,
    ) -> Result<Value> {
        let request = Request::new(next_request_id(), route, method)
            .with_args(args)
            .with_kwargs(kwargs);
        self.send_request(request).await
    }

    /// Send a prepared request; its id is used as is.
    pub async fn send_request(&mut self, mut request: Request) -> Result<Value> {
        for hook in &self.middleware {
            hook.pre(&mut request)?;
        }

        let payload = encode_request(&request)?;
        debug!(
            id = %request.id,
            route = %request.route,
            method = %request.method,
            "calling"
        );
        let reply = self.deliver(&payload).await?;

        let mut raw = unpack_envelope(&reply)?;
        for hook in self.middleware.iter().rev() {
            hook.post(&request, &mut raw)?;
        }

        Response::from_value(raw)?
            .into_result()
            .map_err(Error::Remote)
    }

    async fn deliver(&mut self, payload: &[u8]) -> Result<Bytes> {
        match self.retry {
            Some(policy) => lazy::exchange(&mut self.socket, payload, policy).await,
            None => {
                // An earlier call abandoned mid-flight leaves a reply owed.
                if self.socket.has_outstanding() {
                    self.socket.close();
                }
                self.socket.send(payload).await?;
                self.socket.recv().await
            }
        }
    }

    /// Method names at the root route.
    pub async fn dir(&mut self) -> Result<Vec<String>> {
        self.route("").dir().await
    }

    /// Child routes of the root route.
    pub async fn routes(&mut self) -> Result<Vec<String>> {
        self.route("").routes().await
    }

    /// Documentation of a root-level method.
    pub async fn doc(&mut self, method: &str) -> Result<Option<String>> {
        self.route("").doc(method).await
    }

    /// Proxy addressing methods under `path`.
    pub fn route(&mut self, path: &str) -> RouteProxy<'_> {
        RouteProxy {
            client: self,
            route: path.to_string(),
        }
    }

    /// Drop the connection; the next call reconnects.
    pub fn close(&mut self) {
        self.socket.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("socket", &self.socket)
            .field("retry", &self.retry)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Methods under one route, borrowed from a [`Client`].
pub struct RouteProxy<'a> {
    client: &'a mut Client,
    route: String,
}

impl<'a> RouteProxy<'a> {
    pub fn path(&self) -> &str {
        &self.route
    }

    /// Descend into child route `name`.
    pub fn route(self, name: &str) -> RouteProxy<'a> {
        let route = if self.route.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.route, name)
        };
        RouteProxy {
            client: self.client,
            route,
        }
    }

    pub async fn call(&mut self, method: &str, args: Vec<Value>, kwargs: Map) -> Result<Value> {
        self.client.call(&self.route, method, args, kwargs).await
    }

    /// Method names at this route.
    pub async fn dir(&mut self) -> Result<Vec<String>> {
        let value = self.call(DIR_METHOD, Vec::new(), Map::new()).await?;
        names(value, DIR_METHOD)
    }

    /// Child routes of this route.
    pub async fn routes(&mut self) -> Result<Vec<String>> {
        let value = self.call(ROUTES_METHOD, Vec::new(), Map::new()).await?;
        names(value, ROUTES_METHOD)
    }

    /// Documentation of `method`, `None` if it has none.
    pub async fn doc(&mut self, method: &str) -> Result<Option<String>> {
        match self
            .call(DOC_METHOD, vec![Value::from(method)], Map::new())
            .await?
        {
            Value::Nil => Ok(None),
            Value::String(doc) => Ok(Some(doc)),
            other => Err(Error::MalformedEnvelope(format!(
                "doc reply must be a string or nil, got {}",
                other.type_name()
            ))),
        }
    }
}

fn names(value: Value, method: &str) -> Result<Vec<String>> {
    let malformed = || Error::MalformedEnvelope(format!("{method} reply must be a list of names"));
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                _ => Err(malformed()),
            })
            .collect(),
        _ => Err(malformed()),
    }
}
