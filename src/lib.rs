//! # routewire
//!
//! Message-envelope RPC over a framed request/reply transport.
//!
//! A server exposes functions organised in a tree of dot-separated routes;
//! a client calls them by route and name. Faults raised remotely come back
//! as [`Error::Remote`] carrying the fault kind and message.
//!
//! ## Architecture
//!
//! - **Envelope** ([`protocol::envelope`]): msgpack maps with single-letter keys
//! - **Registry** ([`registry`]): route tree and method lookup
//! - **Middleware** ([`server::Middleware`]): pre/post hooks that may answer
//!   directly or substitute the method
//! - **Dispatcher** ([`Dispatcher`]): per-request state machine that always
//!   produces a response
//! - **Client** ([`Client`]): plain or lazy-retry delivery
//!
//! ## Example
//!
//! ```no_run
//! use routewire::{Client, Map, Server, Value};
//!
//! #[tokio::main]
//! async fn main() -> routewire::Result<()> {
//!     let server = Server::builder()
//!         .method("echo", |_, params| params.required(0, "value").cloned())
//!         .bind("tcp://127.0.0.1:5555")
//!         .await?;
//!     tokio::spawn(server.run());
//!
//!     let mut client = Client::new("tcp://127.0.0.1:5555")?;
//!     let reply = client.call("", "echo", vec![Value::from("hi")], Map::new()).await?;
//!     assert_eq!(reply, Value::from("hi"));
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod fault;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;
pub mod value;

pub use client::{Client, ClientBuilder, ClientMiddleware, RetryPolicy, RouteProxy, StaticExtension};
pub use error::{Error, Result};
pub use fault::Fault;
pub use protocol::{Request, Response};
pub use registry::{Method, MethodHandle, MethodResult, MethodTable, Params, Registry, RouteNode, Service};
pub use server::{
    DispatchState, Dispatcher, IntrospectionMiddleware, LoggingMiddleware, Middleware,
    MiddlewareChain, PostAction, PreAction, Server, ServerBuilder,
};
pub use transport::{Endpoint, TransportConfig};
pub use value::{Map, Value};
