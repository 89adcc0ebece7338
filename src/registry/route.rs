//! Route tree nodes.

use std::collections::HashMap;

use super::{is_valid_name, MethodHandle, RegistryError};

/// One node of the route tree: methods bound here plus named child routes.
///
/// Children are owned by their parent; the tree has no sharing and no cycles.
#[derive(Debug, Clone, Default)]
pub struct RouteNode {
    methods: HashMap<String, MethodHandle>,
    routes: HashMap<String, RouteNode>,
}

impl RouteNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a method at this node under the handle's name.
    ///
    /// # Errors
    ///
    /// `InvalidName` for a non-identifier name, `DuplicateMethod` if the name
    /// is already bound here.
    pub fn add_method(&mut self, handle: MethodHandle) -> Result<(), RegistryError> {
        let name = handle.name();
        if !is_valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.methods.contains_key(name) {
            return Err(RegistryError::DuplicateMethod(name.to_string()));
        }
        self.methods.insert(name.to_string(), handle);
        Ok(())
    }

    /// Attach a child route.
    ///
    /// # Errors
    ///
    /// `InvalidName` for a non-identifier name, `RouteExists` on any collision.
    pub fn add_route(&mut self, name: &str, node: RouteNode) -> Result<(), RegistryError> {
        if !is_valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.routes.contains_key(name) {
            return Err(RegistryError::RouteExists(name.to_string()));
        }
        self.routes.insert(name.to_string(), node);
        Ok(())
    }

    pub fn get_method(&self, name: &str) -> Option<&MethodHandle> {
        self.methods.get(name)
    }

    pub fn get_route(&self, name: &str) -> Option<&RouteNode> {
        self.routes.get(name)
    }

    /// Child route, created empty if missing.
    pub(crate) fn route_entry(&mut self, name: &str) -> &mut RouteNode {
        self.routes.entry(name.to_string()).or_default()
    }

    /// Names of the methods bound here, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of the child routes, sorted.
    pub fn route_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.routes.is_empty()
    }
}
