//! Client-side hooks around each call.

use crate::error::Result;
use crate::protocol::Request;
use crate::value::Value;

/// Hooks run by [`Client`](super::Client) around every call.
///
/// `pre` hooks run in registration order on the outgoing request; `post`
/// hooks run in reverse order on the raw response map, before it is checked
/// for an error marker. An error from either hook aborts the call.
pub trait ClientMiddleware: Send + Sync + 'static {
    fn pre(&self, _request: &mut Request) -> Result<()> {
        Ok(())
    }

    fn post(&self, _request: &Request, _response: &mut Value) -> Result<()> {
        Ok(())
    }
}

/// Stamps a fixed extension field on every request, such as a token under
/// `t`.
#[derive(Debug, Clone)]
pub struct StaticExtension {
    key: String,
    value: Value,
}

impl StaticExtension {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ClientMiddleware for StaticExtension {
    fn pre(&self, request: &mut Request) -> Result<()> {
        request
            .extensions
            .insert(self.key.clone(), self.value.clone());
        Ok(())
    }
}
