//! Procedure registry
//!
//! Local table of named handlers owned by one RPC instance. The last
//! registration for a name wins; registering `None` removes the name.

use crate::error::Cause;
use crate::pending::Deferred;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Arguments as received by a handler
///
/// A sequence on the wire is spread into positional arguments; any other
/// value (typically a mapping) arrives as a single argument. Missing
/// arguments are an empty sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    Positional(Vec<Value>),
    Single(Value),
}

impl Args {
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::Null => Args::Positional(Vec::new()),
            Value::Array(values) => Args::Positional(values),
            other => Args::Single(other),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Args::Positional(values) => values.len(),
            Args::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Args::Positional(values) => values.get(index),
            Args::Single(value) => (index == 0).then_some(value),
        }
    }

    /// Deserializes the argument at `index`
    ///
    /// Missing or ill-typed arguments fail with a `TypeError` cause, so
    /// handlers can use `?` and report them to the caller.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, Cause> {
        let value = self.get(index).ok_or_else(|| {
            Cause::error("TypeError", format!("Missing argument at position {}.", index))
        })?;
        serde_json::from_value(value.clone()).map_err(|err| {
            Cause::error(
                "TypeError",
                format!("Invalid argument at position {}: {}", index, err),
            )
        })
    }

    /// Deserializes all arguments as one value (a sequence for positional)
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, Cause> {
        serde_json::from_value(self.clone().into_value())
            .map_err(|err| Cause::error("TypeError", format!("Invalid arguments: {}", err)))
    }

    pub fn into_value(self) -> Value {
        match self {
            Args::Positional(values) => Value::Array(values),
            Args::Single(value) => value,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ReplyKind {
    Value(Value),
    Unserializable(String),
    Deferred(Deferred),
}

/// Successful handler return
#[derive(Debug, Clone)]
pub struct Reply(pub(crate) ReplyKind);

impl Reply {
    /// Replies with `value`
    ///
    /// A value that cannot be cloned across the boundary makes the
    /// responder answer with a `SendMessageError` instead.
    pub fn value<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Reply(ReplyKind::Value(value)),
            Err(err) => Reply(ReplyKind::Unserializable(err.to_string())),
        }
    }

    /// Replies with nothing (`null`)
    pub fn empty() -> Self {
        Reply(ReplyKind::Value(Value::Null))
    }

    /// Replies later, when `deferred` settles
    pub fn deferred(deferred: Deferred) -> Self {
        Reply(ReplyKind::Deferred(deferred))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply(ReplyKind::Value(value))
    }
}

impl From<Deferred> for Reply {
    fn from(deferred: Deferred) -> Self {
        Reply::deferred(deferred)
    }
}

/// What a handler returns: `Err` is the handler failing with a cause
pub type HandlerResult = Result<Reply, Cause>;

/// A registered procedure implementation
pub type Handler = Rc<dyn Fn(Args) -> HandlerResult>;

/// Name to handler table
///
/// Lookups hand out a clone of the handler, so a handler that is being
/// run is unaffected by a concurrent re-registration of its name.
#[derive(Default)]
pub struct ProcedureRegistry {
    procedures: HashMap<String, Handler>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self {
            procedures: HashMap::new(),
        }
    }

    /// Registers `handler` under `name`, replacing any previous handler
    ///
    /// `None` is the same as [`unregister`](Self::unregister). Returns the
    /// handler that was replaced, if any.
    pub fn register(&mut self, name: impl Into<String>, handler: Option<Handler>) -> Option<Handler> {
        let name = name.into();
        match handler {
            Some(handler) => self.procedures.insert(name, handler),
            None => self.procedures.remove(&name),
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Handler> {
        self.procedures.remove(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.procedures.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.procedures.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.procedures.len()
    }
}
