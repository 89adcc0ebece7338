//! Callable methods and the handles the registry stores.

use std::fmt;
use std::sync::Arc;

use super::Params;
use crate::fault::Fault;
use crate::protocol::Request;
use crate::value::Value;

/// Result type for method invocations.
pub type MethodResult = std::result::Result<Value, Fault>;

/// Trait for remotely callable methods.
///
/// Implemented for every `Fn(&Request, Params<'_>) -> MethodResult`, so plain
/// closures register directly. Implement it by hand when the method carries
/// state or documentation.
pub trait Method: Send + Sync + 'static {
    /// Invoke the method with the request and its bound arguments.
    fn call(&self, request: &Request, params: Params<'_>) -> MethodResult;

    /// Documentation returned by the `doc` introspection pseudo-method.
    fn doc(&self) -> Option<&str> {
        None
    }
}

impl<F> Method for F
where
    F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
{
    #[inline]
    fn call(&self, request: &Request, params: Params<'_>) -> MethodResult {
        self(request, params)
    }
}

/// A named, cheaply clonable reference to a registered method.
#[derive(Clone)]
pub struct MethodHandle {
    name: Arc<str>,
    method: Arc<dyn Method>,
    doc: Option<Arc<str>>,
}

impl MethodHandle {
    /// Wrap any [`Method`] implementation.
    pub fn new(name: impl Into<String>, method: impl Method) -> Self {
        let doc = method.doc().map(Arc::from);
        Self {
            name: Arc::from(name.into()),
            method: Arc::new(method),
            doc,
        }
    }

    /// Wrap a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Request, Params<'_>) -> MethodResult + Send + Sync + 'static,
    {
        Self::new(name, f)
    }

    /// Attach or replace the documentation string.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(Arc::from(doc.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    #[inline]
    pub fn call(&self, request: &Request, params: Params<'_>) -> MethodResult {
        self.method.call(request, params)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}
