//! Middleware shipped with the server.

use tracing::{debug, warn};

use super::middleware::{Middleware, PostAction, PreAction};
use crate::fault::Fault;
use crate::protocol::Request;
use crate::registry::{MethodHandle, Registry};
use crate::value::Value;

/// Pseudo-method listing the methods at the request route.
pub const DIR_METHOD: &str = "dir";
/// Pseudo-method listing the child routes of the request route.
pub const ROUTES_METHOD: &str = "routes";
/// Pseudo-method returning a method's documentation.
pub const DOC_METHOD: &str = "doc";

/// Answers `dir`, `routes` and `doc(name)` from the registry.
///
/// Only requests that did not resolve to a real method are intercepted, so a
/// registered method called `dir` still wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrospectionMiddleware;

impl Middleware for IntrospectionMiddleware {
    fn pre(
        &self,
        request: &mut Request,
        method: Option<&MethodHandle>,
        registry: &Registry,
    ) -> PreAction {
        if method.is_some() {
            return PreAction::Continue;
        }

        let listing = match request.method.as_str() {
            DIR_METHOD => registry.list_methods(&request.route),
            ROUTES_METHOD => registry.list_routes(&request.route),
            DOC_METHOD => return describe(request, registry),
            _ => return PreAction::Continue,
        };

        match listing {
            Ok(names) => PreAction::Respond(Value::Array(
                names.into_iter().map(Value::from).collect(),
            )),
            Err(err) => PreAction::Fail(err.into()),
        }
    }
}

fn describe(request: &Request, registry: &Registry) -> PreAction {
    let name = match request.params().str(0, "method") {
        Ok(name) => name,
        Err(fault) => return PreAction::Fail(fault),
    };

    match registry.resolve_method(&request.route, name) {
        Ok(handle) => PreAction::Respond(handle.doc().map_or(Value::Nil, Value::from)),
        Err(err) => PreAction::Fail(Fault::from(err)),
    }
}

/// Emits a `tracing` event for every request and its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn pre(
        &self,
        request: &mut Request,
        method: Option<&MethodHandle>,
        _registry: &Registry,
    ) -> PreAction {
        debug!(
            id = %request.id,
            route = %request.route,
            method = %request.method,
            args = request.args.len(),
            kwargs = request.kwargs.len(),
            resolved = method.is_some(),
            "request received"
        );
        PreAction::Continue
    }

    fn post(
        &self,
        request: &Request,
        method: &MethodHandle,
        _response: &Value,
        error: Option<&Fault>,
    ) -> PostAction {
        match error {
            Some(fault) => warn!(
                id = %request.id,
                route = %request.route,
                method = method.name(),
                kind = fault.kind(),
                message = fault.message(),
                "method failed"
            ),
            None => debug!(
                id = %request.id,
                route = %request.route,
                method = method.name(),
                "method succeeded"
            ),
        }
        PostAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .add_documented_method("tools", "hammer", "Hit things.", |_, _| Ok(Value::Nil))
            .unwrap();
        registry
            .add_method("tools", "saw", |_, _| Ok(Value::Nil))
            .unwrap();
        registry
            .add_method("tools.power", "drill", |_, _| Ok(Value::Nil))
            .unwrap();
        registry
    }

    fn run(request: Request) -> PreAction {
        let registry = registry();
        let mut request = request;
        let resolved = registry
            .resolve_method(&request.route, &request.method)
            .ok()
            .cloned();
        IntrospectionMiddleware.pre(&mut request, resolved.as_ref(), &registry)
    }

    #[test]
    fn test_dir_lists_methods() {
        match run(Request::new("1", "tools", "dir")) {
            PreAction::Respond(value) => assert_eq!(
                value,
                Value::Array(vec![Value::from("hammer"), Value::from("saw")])
            ),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_routes_lists_children() {
        match run(Request::new("1", "tools", "routes")) {
            PreAction::Respond(value) => {
                assert_eq!(value, Value::Array(vec![Value::from("power")]))
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_doc_returns_doc_or_nil() {
        let request = Request::new("1", "tools", "doc").with_args(vec![Value::from("hammer")]);
        assert!(matches!(run(request), PreAction::Respond(Value::String(ref s)) if s == "Hit things."));

        let request = Request::new("1", "tools", "doc").with_args(vec![Value::from("saw")]);
        assert!(matches!(run(request), PreAction::Respond(Value::Nil)));
    }

    #[test]
    fn test_doc_unknown_method_is_key_error() {
        let request = Request::new("1", "tools", "doc").with_args(vec![Value::from("wrench")]);
        match run(request) {
            PreAction::Fail(fault) => {
                assert_eq!(fault.kind(), "KeyError");
                assert_eq!(fault.message(), "No such method: wrench");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_dir_on_unknown_route_is_key_error() {
        assert!(matches!(
            run(Request::new("1", "garage", "dir")),
            PreAction::Fail(ref f) if f.kind() == "KeyError"
        ));
    }

    #[test]
    fn test_other_methods_pass_through() {
        assert!(matches!(
            run(Request::new("1", "tools", "missing")),
            PreAction::Continue
        ));
        assert!(matches!(
            run(Request::new("1", "tools", "saw")),
            PreAction::Continue
        ));
    }

    #[test]
    fn test_logging_passes_through() {
        let registry = registry();
        let handle = registry.resolve_method("tools", "saw").unwrap().clone();
        let mut request = Request::new("1", "tools", "saw");

        assert!(matches!(
            LoggingMiddleware.pre(&mut request, Some(&handle), &registry),
            PreAction::Continue
        ));
        assert!(matches!(
            LoggingMiddleware.post(&request, &handle, &Value::Nil, None),
            PostAction::Continue
        ));

        let fault = Fault::type_error("bad argument");
        assert!(matches!(
            LoggingMiddleware.post(&request, &handle, &Value::Nil, Some(&fault)),
            PostAction::Continue
        ));
        assert_eq!(request, Request::new("1", "tools", "saw"));
    }
}
