//! Method registry - hierarchical routes and method lookup.
//!
//! Routes form a tree addressed by dot-separated paths; `""` is the root.
//! Every route segment and method name is an identifier
//! (`[A-Za-z_][A-Za-z0-9_-]*`), so a path never contains empty segments.
//!
//! The registry is populated before serving and then moved into the
//! [`Dispatcher`](crate::server::Dispatcher), which only ever reads it.
//!
//! # Example
//!
//! ```
//! use routewire::registry::Registry;
//! use routewire::Value;
//!
//! let mut registry = Registry::new();
//! registry.add_method("", "ping", |_, _| Ok(Value::from("pong"))).unwrap();
//! registry.add_method("admin.users", "count", |_, _| Ok(Value::Int(3))).unwrap();
//!
//! assert!(registry.resolve_method("admin.users", "count").is_ok());
//! assert!(registry.resolve_method("admin", "count").is_err());
//! assert_eq!(registry.list_routes("admin").unwrap(), vec!["users"]);
//! ```

mod method;
mod params;
mod route;
mod service;

use thiserror::Error;

pub use method::{Method, MethodHandle, MethodResult};
pub use params::Params;
pub use route::RouteNode;
pub use service::{MethodTable, Service, ServiceFn};

use crate::protocol::Request;

/// Registration and lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Invalid route path: {0:?}")]
    InvalidPath(String),

    #[error("Method already registered: {0}")]
    DuplicateMethod(String),

    #[error("Route already exists: {0}")]
    RouteExists(String),

    #[error("No such route: {0}")]
    NoSuchRoute(String),

    #[error("No such method: {0}")]
    NoSuchMethod(String),
}

/// Check that a method or route segment name is an identifier.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Route tree with a root node.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    root: RouteNode,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &RouteNode {
        &self.root
    }

    /// Register a closure as `name` under `route`.
    ///
    /// Intermediate routes are created as needed.
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `InvalidName`, or `DuplicateMethod` when `name` is
    /// already bound at that route.
    pub fn add_method<F>(&mut self, route: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.add_handle(route, MethodHandle::from_fn(name, f))
    }

    /// Register a closure with a doc string for introspection.
    pub fn add_documented_method<F>(
        &mut self,
        route: &str,
        name: &str,
        doc: &str,
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.add_handle(route, MethodHandle::from_fn(name, f).with_doc(doc))
    }

    /// Register a prepared handle under `route`.
    pub fn add_handle(&mut self, route: &str, handle: MethodHandle) -> Result<(), RegistryError> {
        if !is_valid_name(handle.name()) {
            return Err(RegistryError::InvalidName(handle.name().to_string()));
        }
        let node = self.node_entry(route)?;
        node.add_method(handle).map_err(|e| qualify(route, e))
    }

    /// Attach an owned route node as child `name` of `route`.
    ///
    /// # Errors
    ///
    /// `RouteExists` on any collision.
    pub fn add_route(&mut self, route: &str, name: &str, node: RouteNode) -> Result<(), RegistryError> {
        if !is_valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let parent = self.node_entry(route)?;
        parent.add_route(name, node).map_err(|e| qualify(route, e))
    }

    /// Register every method of a service's table under `route`.
    ///
    /// Stops at the first failing entry; entries before it stay registered.
    pub fn add_service<S: Service>(&mut self, route: &str, service: S) -> Result<(), RegistryError> {
        for handle in service::bind_service(service) {
            self.add_handle(route, handle)?;
        }
        Ok(())
    }

    /// Find the node at `route`, matching the whole path.
    ///
    /// # Errors
    ///
    /// `NoSuchRoute` carrying the full requested path.
    pub fn resolve(&self, route: &str) -> Result<&RouteNode, RegistryError> {
        if route.is_empty() {
            return Ok(&self.root);
        }

        let mut node = &self.root;
        for segment in route.split('.') {
            node = node
                .get_route(segment)
                .ok_or_else(|| RegistryError::NoSuchRoute(route.to_string()))?;
        }
        Ok(node)
    }

    /// Find method `name` at `route`.
    ///
    /// # Errors
    ///
    /// `NoSuchRoute` if the path does not resolve, otherwise `NoSuchMethod`.
    pub fn resolve_method(&self, route: &str, name: &str) -> Result<&MethodHandle, RegistryError> {
        self.resolve(route)?
            .get_method(name)
            .ok_or_else(|| RegistryError::NoSuchMethod(name.to_string()))
    }

    /// Child route names at `route`, sorted.
    pub fn list_routes(&self, route: &str) -> Result<Vec<&str>, RegistryError> {
        Ok(self.resolve(route)?.route_names())
    }

    /// Method names at `route`, sorted.
    pub fn list_methods(&self, route: &str) -> Result<Vec<&str>, RegistryError> {
        Ok(self.resolve(route)?.method_names())
    }

    fn node_entry(&mut self, route: &str) -> Result<&mut RouteNode, RegistryError> {
        if route.is_empty() {
            return Ok(&mut self.root);
        }
        if !route.split('.').all(is_valid_name) {
            return Err(RegistryError::InvalidPath(route.to_string()));
        }

        let mut node = &mut self.root;
        for segment in route.split('.') {
            node = node.route_entry(segment);
        }
        Ok(node)
    }
}

/// Prefix a node-level error with the route it happened at.
fn qualify(route: &str, err: RegistryError) -> RegistryError {
    if route.is_empty() {
        return err;
    }
    match err {
        RegistryError::DuplicateMethod(name) => {
            RegistryError::DuplicateMethod(format!("{route}.{name}"))
        }
        RegistryError::RouteExists(name) => RegistryError::RouteExists(format!("{route}.{name}")),
        other => other,
    }
}
