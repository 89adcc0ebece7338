//! Statically declared method tables.
//!
//! A [`Service`] lists the methods it exposes in a [`MethodTable`]; mounting
//! it registers each entry as a method bound to one shared instance.
//!
//! # Example
//!
//! ```
//! use routewire::registry::{MethodResult, MethodTable, Params, Registry, Service};
//! use routewire::{Request, Value};
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! impl Greeter {
//!     fn greet(&self, _req: &Request, params: Params<'_>) -> MethodResult {
//!         let name = params.str(0, "name")?;
//!         Ok(Value::from(format!("{}, {name}!", self.greeting)))
//!     }
//! }
//!
//! impl Service for Greeter {
//!     fn method_table() -> MethodTable<Self> {
//!         MethodTable::new().documented("greet", "Greet someone by name.", Greeter::greet)
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry
//!     .add_service("greeter", Greeter { greeting: "Hello".into() })
//!     .unwrap();
//! assert!(registry.resolve_method("greeter", "greet").is_ok());
//! ```

use std::sync::Arc;

use super::{MethodHandle, MethodResult, Params};
use crate::protocol::Request;

/// Signature of a service method.
pub type ServiceFn<S> = fn(&S, &Request, Params<'_>) -> MethodResult;

struct TableEntry<S> {
    name: &'static str,
    doc: Option<&'static str>,
    func: ServiceFn<S>,
}

/// The methods a [`Service`] exposes.
pub struct MethodTable<S> {
    entries: Vec<TableEntry<S>>,
}

impl<S> MethodTable<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Expose `func` under `name`.
    pub fn method(mut self, name: &'static str, func: ServiceFn<S>) -> Self {
        self.entries.push(TableEntry {
            name,
            doc: None,
            func,
        });
        self
    }

    /// Expose `func` under `name` with documentation.
    pub fn documented(mut self, name: &'static str, doc: &'static str, func: ServiceFn<S>) -> Self {
        self.entries.push(TableEntry {
            name,
            doc: Some(doc),
            func,
        });
        self
    }
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A handler object with a fixed set of remotely callable methods.
pub trait Service: Send + Sync + Sized + 'static {
    fn method_table() -> MethodTable<Self>;
}

/// Turn a service instance into one handle per table entry.
pub(crate) fn bind_service<S: Service>(service: S) -> Vec<MethodHandle> {
    let service = Arc::new(service);
    S::method_table()
        .entries
        .into_iter()
        .map(|entry| {
            let target = Arc::clone(&service);
            let func = entry.func;
            let handle =
                MethodHandle::from_fn(entry.name, move |request, params| func(&target, request, params));
            match entry.doc {
                Some(doc) => handle.with_doc(doc),
                None => handle,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::Fault;
    use crate::value::Value;

    struct Calculator;

    impl Calculator {
        fn add(&self, _: &Request, params: Params<'_>) -> MethodResult {
            Ok(Value::Int(params.i64(0, "a")? + params.i64(1, "b")?))
        }

        fn div(&self, _: &Request, params: Params<'_>) -> MethodResult {
            let a = params.i64(0, "a")?;
            let b = params.i64(1, "b")?;
            if b == 0 {
                return Err(Fault::zero_division("integer division by zero"));
            }
            Ok(Value::Int(a / b))
        }
    }

    impl Service for Calculator {
        fn method_table() -> MethodTable<Self> {
            MethodTable::new()
                .method("add", Calculator::add)
                .documented("div", "Integer division.", Calculator::div)
        }
    }

    #[test]
    fn test_bind_service_creates_handles() {
        let handles = bind_service(Calculator);
        let names: Vec<&str> = handles.iter().map(MethodHandle::name).collect();
        assert_eq!(names, vec!["add", "div"]);
        assert_eq!(handles[0].doc(), None);
        assert_eq!(handles[1].doc(), Some("Integer division."));
    }

    #[test]
    fn test_bound_methods_call_through() {
        let handles = bind_service(Calculator);
        let request = Request::new("1", "", "div").with_args(vec![Value::Int(7), Value::Int(0)]);

        let fault = handles[1].call(&request, request.params()).unwrap_err();
        assert_eq!(fault.kind(), "ZeroDivisionError");

        let request = Request::new("2", "", "add").with_args(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(handles[0].call(&request, request.params()), Ok(Value::Int(5)));
    }
}
