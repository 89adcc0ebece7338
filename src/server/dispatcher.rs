//! Per-request dispatch state machine.
//!
//! ```text
//! Idle -> Received -> Decoded -> Resolved -> PreMiddleware -> Invoked -> PostMiddleware -> Responded
//!             \           \                        \                         \
//!              +-----------+------------------------+-------------------------+--> Responded
//! ```
//!
//! Every path ends in exactly one response. A decode failure, a failed
//! lookup, a method fault, a panic and a middleware failure all become
//! error responses; nothing here takes the server down.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace};

use super::middleware::{MiddlewareChain, PostOutcome, PreOutcome};
use crate::fault::Fault;
use crate::protocol::{decode_request, encode_response, Request, Response};
use crate::registry::Registry;

/// Sent when a response cannot be encoded at all.
///
/// `{"e": "ProtocolError", "e_msg": "response encoding failed"}`
const FALLBACK_RESPONSE: &[u8] = b"\x82\xa1e\xadProtocolError\xa5e_msg\xb8response encoding failed";

/// Stages a request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Received,
    Decoded,
    Resolved,
    PreMiddleware,
    Invoked,
    PostMiddleware,
    Responded,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Received => "received",
            DispatchState::Decoded => "decoded",
            DispatchState::Resolved => "resolved",
            DispatchState::PreMiddleware => "pre-middleware",
            DispatchState::Invoked => "invoked",
            DispatchState::PostMiddleware => "post-middleware",
            DispatchState::Responded => "responded",
        };
        f.write_str(name)
    }
}

fn enter(state: DispatchState, request: Option<&Request>) {
    match request {
        Some(request) => trace!(%state, id = %request.id, "dispatch"),
        None => trace!(%state, "dispatch"),
    }
}

/// Turns request envelopes into response envelopes.
///
/// The registry and middleware are read-only once the dispatcher exists, so
/// it can be shared between threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Registry,
    middleware: MiddlewareChain,
}

impl Dispatcher {
    /// Dispatcher without middleware.
    pub fn new(registry: Registry) -> Self {
        Self::with_middleware(registry, MiddlewareChain::new())
    }

    pub fn with_middleware(registry: Registry, middleware: MiddlewareChain) -> Self {
        Self {
            registry,
            middleware,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Dispatch raw request bytes and return the encoded response.
    ///
    /// Always returns a well-formed response envelope.
    pub fn handle_bytes(&self, payload: &[u8]) -> Vec<u8> {
        enter(DispatchState::Received, None);

        let response = match decode_request(payload) {
            Ok(request) => {
                enter(DispatchState::Decoded, Some(&request));
                self.handle_request(request)
            }
            Err(err) => {
                trace!(error = %err, "request decode failed");
                Response::Failure(Fault::protocol(err.to_string()))
            }
        };

        encode_reply(&response)
    }

    /// Dispatch one decoded request.
    ///
    /// A panic in a middleware hook becomes a `RuntimeError` response.
    pub fn handle_request(&self, request: Request) -> Response {
        panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(request))).unwrap_or_else(|cause| {
            let message = panic_message(cause.as_ref());
            error!(%message, "dispatch panicked");
            Response::Failure(Fault::runtime(message))
        })
    }

    fn dispatch(&self, mut request: Request) -> Response {
        let (method, pending) = match self
            .registry
            .resolve_method(&request.route, &request.method)
        {
            Ok(handle) => (Some(handle.clone()), None),
            Err(err) => (None, Some(Fault::from(err))),
        };
        enter(DispatchState::Resolved, Some(&request));

        enter(DispatchState::PreMiddleware, Some(&request));
        let (method, pending) = match self.middleware.run_pre(&mut request, method, &self.registry) {
            PreOutcome::Respond(value) => return respond(&request, Response::Success(value)),
            PreOutcome::Fail(fault) => return respond(&request, Response::Failure(fault)),
            PreOutcome::Proceed {
                method,
                substituted,
            } => (method, if substituted { None } else { pending }),
        };

        let method = match (method, pending) {
            (Some(method), None) => method,
            (_, Some(fault)) => return respond(&request, Response::Failure(fault)),
            (None, None) => {
                let fault = Fault::key_error(format!("No such method: {}", request.method));
                return respond(&request, Response::Failure(fault));
            }
        };

        enter(DispatchState::Invoked, Some(&request));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            method.call(&request, request.params())
        }))
        .unwrap_or_else(|cause| {
            let message = panic_message(cause.as_ref());
            error!(
                id = %request.id,
                method = method.name(),
                %message,
                "method panicked"
            );
            Err(Fault::runtime(message))
        });
        let (value, error) = match outcome {
            Ok(value) => (value, None),
            Err(fault) => (Default::default(), Some(fault)),
        };

        enter(DispatchState::PostMiddleware, Some(&request));
        let response = match self.middleware.run_post(&request, &method, value, error) {
            PostOutcome::Finished {
                error: Some(fault), ..
            } => Response::Failure(fault),
            PostOutcome::Finished { response, .. } => Response::Success(response),
            PostOutcome::Respond(value) => Response::Success(value),
            PostOutcome::Fail(fault) => Response::Failure(fault),
        };

        respond(&request, response)
    }
}

fn respond(request: &Request, response: Response) -> Response {
    enter(DispatchState::Responded, Some(request));
    response
}

/// Encode a response, falling back to a fixed protocol error.
pub(crate) fn encode_reply(response: &Response) -> Vec<u8> {
    encode_response(response).unwrap_or_else(|err| {
        error!(error = %err, "response encoding failed");
        FALLBACK_RESPONSE.to_vec()
    })
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "method panicked".to_string()
    }
}
