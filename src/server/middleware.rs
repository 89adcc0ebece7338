//! Server middleware - ordered pre/post hooks around method invocation.
//!
//! Pre hooks run in registration order before the method is invoked; post
//! hooks run in reverse registration order afterwards. Control flow is an
//! explicit return value:
//!
//! | Hook | Action | Effect |
//! |------|--------|--------|
//! | pre  | [`PreAction::Respond`]   | send value as success, skip everything else |
//! | pre  | [`PreAction::UseMethod`] | bind a different method, clear lookup failure, continue |
//! | pre  | [`PreAction::Fail`]      | send the fault, skip everything else |
//! | post | [`PostAction::Replace`]  | later hooks and the reply see the new value |
//! | post | [`PostAction::Respond`]  | send value as success, drop any pending error |
//! | post | [`PostAction::Fail`]     | send the new fault, drop response and pending error |

use std::fmt;
use std::sync::Arc;

use crate::fault::Fault;
use crate::protocol::Request;
use crate::registry::{MethodHandle, Registry};
use crate::value::Value;

/// Outcome of a pre hook.
#[derive(Debug)]
pub enum PreAction {
    /// Proceed to the next hook.
    Continue,
    /// Short-circuit with a successful response.
    Respond(Value),
    /// Replace the method to invoke and continue.
    UseMethod(MethodHandle),
    /// Short-circuit with an error response.
    Fail(Fault),
}

/// Outcome of a post hook.
#[derive(Debug)]
pub enum PostAction {
    /// Keep the current response.
    Continue,
    /// Replace the response value; a pending error still wins.
    Replace(Value),
    /// Stop post-processing and send this value as success.
    Respond(Value),
    /// Stop post-processing and send this fault.
    Fail(Fault),
}

/// Hooks run by the dispatcher around each invocation.
///
/// Both hooks default to [`Continue`](PreAction::Continue).
pub trait Middleware: Send + Sync + 'static {
    /// Runs before invocation.
    ///
    /// `method` is `None` when lookup failed; the failure is only reported if
    /// no hook binds a method with [`PreAction::UseMethod`].
    fn pre(
        &self,
        _request: &mut Request,
        _method: Option<&MethodHandle>,
        _registry: &Registry,
    ) -> PreAction {
        PreAction::Continue
    }

    /// Runs after invocation with the current response and pending error.
    ///
    /// The response is nil while an error is pending.
    fn post(
        &self,
        _request: &Request,
        _method: &MethodHandle,
        _response: &Value,
        _error: Option<&Fault>,
    ) -> PostAction {
        PostAction::Continue
    }
}

/// Result of the pre phase as seen by the dispatcher.
#[derive(Debug)]
pub(crate) enum PreOutcome {
    Proceed {
        method: Option<MethodHandle>,
        substituted: bool,
    },
    Respond(Value),
    Fail(Fault),
}

/// Result of the post phase as seen by the dispatcher.
#[derive(Debug)]
pub(crate) enum PostOutcome {
    Finished {
        response: Value,
        error: Option<Fault>,
    },
    Respond(Value),
    Fail(Fault),
}

/// Ordered list of middleware, fixed once serving starts.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    hooks: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs after those already added in the pre
    /// phase and before them in the post phase.
    pub fn push(&mut self, middleware: impl Middleware) {
        self.push_shared(Arc::new(middleware));
    }

    /// Append an already shared middleware.
    pub fn push_shared(&mut self, middleware: Arc<dyn Middleware>) {
        self.hooks.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn run_pre(
        &self,
        request: &mut Request,
        mut method: Option<MethodHandle>,
        registry: &Registry,
    ) -> PreOutcome {
        let mut substituted = false;

        for hook in &self.hooks {
            match hook.pre(request, method.as_ref(), registry) {
                PreAction::Continue => {}
                PreAction::Respond(value) => return PreOutcome::Respond(value),
                PreAction::Fail(fault) => return PreOutcome::Fail(fault),
                PreAction::UseMethod(handle) => {
                    method = Some(handle);
                    substituted = true;
                }
            }
        }

        PreOutcome::Proceed {
            method,
            substituted,
        }
    }

    pub(crate) fn run_post(
        &self,
        request: &Request,
        method: &MethodHandle,
        mut response: Value,
        error: Option<Fault>,
    ) -> PostOutcome {
        for hook in self.hooks.iter().rev() {
            match hook.post(request, method, &response, error.as_ref()) {
                PostAction::Continue => {}
                PostAction::Replace(value) => response = value,
                PostAction::Respond(value) => return PostOutcome::Respond(value),
                PostAction::Fail(fault) => return PostOutcome::Fail(fault),
            }
        }

        PostOutcome::Finished { response, error }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}
