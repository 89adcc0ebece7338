//! Positional-or-keyword argument binding.
//!
//! A request carries positional arguments and keyword arguments. A method
//! parameter may be supplied either way, so lookups name both the position
//! and the keyword. Binding failures are `TypeError` faults.

use crate::fault::Fault;
use crate::value::{Map, Value};

/// Borrowed view of a request's arguments.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    args: &'a [Value],
    kwargs: &'a Map,
}

impl<'a> Params<'a> {
    pub fn new(args: &'a [Value], kwargs: &'a Map) -> Self {
        Self { args, kwargs }
    }

    /// Positional arguments as sent.
    pub fn positional(&self) -> &'a [Value] {
        self.args
    }

    /// Keyword arguments as sent.
    pub fn keywords(&self) -> &'a Map {
        self.kwargs
    }

    /// Total number of supplied arguments.
    pub fn len(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a parameter by position, falling back to its keyword.
    ///
    /// Returns `Ok(None)` when it was supplied neither way.
    ///
    /// # Errors
    ///
    /// `TypeError` when the parameter was supplied both positionally and by keyword.
    pub fn get(&self, index: usize, name: &str) -> Result<Option<&'a Value>, Fault> {
        match (self.args.get(index), self.kwargs.get(name)) {
            (Some(_), Some(_)) => Err(Fault::type_error(format!(
                "got multiple values for argument '{name}'"
            ))),
            (Some(value), None) | (None, Some(value)) => Ok(Some(value)),
            (None, None) => Ok(None),
        }
    }

    /// Like [`get`](Self::get), but the parameter must be present.
    pub fn required(&self, index: usize, name: &str) -> Result<&'a Value, Fault> {
        self.get(index, name)?.ok_or_else(|| {
            Fault::type_error(format!("missing required argument: '{name}'"))
        })
    }

    /// Required text parameter.
    pub fn str(&self, index: usize, name: &str) -> Result<&'a str, Fault> {
        let value = self.required(index, name)?;
        value.as_str().ok_or_else(|| mismatch(name, "str", value))
    }

    /// Optional text parameter with a default.
    pub fn str_or(&self, index: usize, name: &str, default: &'a str) -> Result<&'a str, Fault> {
        match self.get(index, name)? {
            None => Ok(default),
            Some(value) => value.as_str().ok_or_else(|| mismatch(name, "str", value)),
        }
    }

    /// Required integer parameter.
    pub fn i64(&self, index: usize, name: &str) -> Result<i64, Fault> {
        let value = self.required(index, name)?;
        value.as_i64().ok_or_else(|| mismatch(name, "int", value))
    }

    /// Required numeric parameter; integers are widened.
    pub fn f64(&self, index: usize, name: &str) -> Result<f64, Fault> {
        let value = self.required(index, name)?;
        value.as_f64().ok_or_else(|| mismatch(name, "number", value))
    }

    /// Required boolean parameter.
    pub fn bool(&self, index: usize, name: &str) -> Result<bool, Fault> {
        let value = self.required(index, name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
    }

    /// Check that the arguments fit a parameter list.
    ///
    /// Rejects surplus positional arguments and keywords that name no parameter.
    pub fn expect_arity(&self, names: &[&str]) -> Result<(), Fault> {
        if self.args.len() > names.len() {
            return Err(Fault::type_error(format!(
                "takes {} positional argument(s) but {} were given",
                names.len(),
                self.args.len()
            )));
        }

        if let Some(unknown) = self.kwargs.keys().find(|key| !names.contains(&key.as_str())) {
            return Err(Fault::type_error(format!(
                "got an unexpected keyword argument '{unknown}'"
            )));
        }

        Ok(())
    }
}

fn mismatch(name: &str, expected: &str, got: &Value) -> Fault {
    Fault::type_error(format!(
        "argument '{name}' must be {expected}, got {}",
        got.type_name()
    ))
}
