//! Error taxonomy
//!
//! Every failure an invocation can meet is one of a small set of named
//! kinds. Errors cross the context boundary as descriptions
//! (`{name, message, cause?}`) and are rebuilt on the other side as a
//! tagged [`RpcError`]; the original type is never resurrected.
//!
//! Callers of `invoke()` only ever see [`InvocationError`] and branch on
//! `cause.name()`.

use ipc::ChannelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Wire form of an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
}

impl ErrorDescription {
    /// Reads a description out of an arbitrary value
    ///
    /// Only objects with string `name` and `message` fields qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = object.get("name")?.as_str()?;
        let message = object.get("message")?.as_str()?;
        Some(Self {
            name: name.to_string(),
            message: message.to_string(),
            cause: object.get("cause").filter(|c| !c.is_null()).cloned(),
        })
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("name".to_string(), Value::String(self.name.clone()));
        object.insert("message".to_string(), Value::String(self.message.clone()));
        if let Some(cause) = &self.cause {
            object.insert("cause".to_string(), cause.clone());
        }
        Value::Object(object)
    }
}

/// Named failure kinds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// The responder has no live handler for the requested name
    #[error("Remote procedure '{procedure_name}' not registered in remote RPC instance.")]
    ProcedureNotFound { procedure_name: String },

    /// A handler failed; `cause` is what it failed with, as-is
    #[error("{message}")]
    Evaluation { message: String, cause: Cause },

    /// No outcome arrived in time on the last attempt
    #[error("Timeout after {timeout_ms} ms.")]
    Timeout {
        procedure_name: String,
        timeout_ms: i64,
    },

    /// An envelope could not be handed to the channel
    #[error("{message}")]
    SendMessage {
        message: String,
        cause: Option<Cause>,
    },

    #[error("Procedure name must be a non-empty string.")]
    InvalidProcedureName,

    #[error("Invocation of '{procedure_name}' was cancelled.")]
    Cancelled { procedure_name: String },

    /// Any other described error, e.g. a handler's own `Error`
    #[error("{message}")]
    Foreign {
        name: String,
        message: String,
        cause: Option<Cause>,
    },
}

impl RpcError {
    pub const PROCEDURE_NOT_FOUND: &'static str = "ProcedureNotFoundError";
    pub const EVALUATION: &'static str = "EvaluationError";
    pub const TIMEOUT: &'static str = "TimeoutError";
    pub const SEND_MESSAGE: &'static str = "SendMessageError";
    pub const TYPE: &'static str = "TypeError";
    pub const ABORT: &'static str = "AbortError";

    /// Name callers branch on
    pub fn name(&self) -> &str {
        match self {
            RpcError::ProcedureNotFound { .. } => Self::PROCEDURE_NOT_FOUND,
            RpcError::Evaluation { .. } => Self::EVALUATION,
            RpcError::Timeout { .. } => Self::TIMEOUT,
            RpcError::SendMessage { .. } => Self::SEND_MESSAGE,
            RpcError::InvalidProcedureName => Self::TYPE,
            RpcError::Cancelled { .. } => Self::ABORT,
            RpcError::Foreign { name, .. } => name,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Nested cause, if this kind carries one
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            RpcError::Evaluation { cause, .. } => Some(cause),
            RpcError::SendMessage { cause, .. } | RpcError::Foreign { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Wraps a handler fault
    pub fn evaluation(cause: Cause) -> Self {
        RpcError::Evaluation {
            message: cause.message(),
            cause,
        }
    }

    /// A value could not be cloned across the boundary
    pub fn data_clone(err: &dyn fmt::Display) -> Self {
        RpcError::SendMessage {
            message: format!("Failed to send message: {}", err),
            cause: Some(Cause::error("DataCloneError", err.to_string())),
        }
    }

    pub fn channel_closed() -> Self {
        RpcError::SendMessage {
            message: "Failed to send message: channel closed.".to_string(),
            cause: None,
        }
    }

    pub fn channel(err: &ChannelError) -> Self {
        RpcError::SendMessage {
            message: format!("Failed to send message: {}", err),
            cause: None,
        }
    }

    pub fn describe(&self) -> ErrorDescription {
        ErrorDescription {
            name: self.name().to_string(),
            message: self.message(),
            cause: self.cause().map(Cause::to_wire),
        }
    }

    /// Rebuilds a tagged error from its description
    ///
    /// `procedure_name` is the name of the invocation the description
    /// arrived for. A `ProcedureNotFoundError` about some other name (one
    /// relayed from further away) keeps its own message. Nested causes are
    /// rebuilt all the way down.
    pub fn from_description(description: ErrorDescription, procedure_name: &str) -> Self {
        let ErrorDescription {
            name,
            message,
            cause,
        } = description;
        let cause = cause.map(|c| Cause::from_wire(c, procedure_name));

        match name.as_str() {
            Self::PROCEDURE_NOT_FOUND => {
                let not_found = RpcError::ProcedureNotFound {
                    procedure_name: procedure_name.to_string(),
                };
                if not_found.message() == message {
                    return not_found;
                }
            }
            Self::EVALUATION => {
                return RpcError::Evaluation {
                    message,
                    cause: cause.unwrap_or(Cause::Value(Value::Null)),
                }
            }
            Self::SEND_MESSAGE => return RpcError::SendMessage { message, cause },
            _ => {}
        }
        RpcError::Foreign {
            name,
            message,
            cause,
        }
    }
}

/// What something failed with
///
/// Handlers may fail with a described error or with any raw value; the
/// latter is preserved untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Cause {
    Error(Box<RpcError>),
    Value(Value),
}

impl Cause {
    /// A plain named error, as a handler would throw it
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Cause::Error(Box::new(RpcError::Foreign {
            name: name.into(),
            message: message.into(),
            cause: None,
        }))
    }

    /// A raw non-error value
    pub fn value(value: impl Into<Value>) -> Self {
        Cause::Value(value.into())
    }

    /// Describes a Rust error as a generic `Error`
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Cause::error("Error", err.to_string())
    }

    /// Error name, when this is a described error
    pub fn name(&self) -> Option<&str> {
        match self {
            Cause::Error(err) => Some(err.name()),
            Cause::Value(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Cause::Error(err) => err.message(),
            Cause::Value(Value::String(s)) => s.clone(),
            Cause::Value(value) => value.to_string(),
        }
    }

    pub fn as_error(&self) -> Option<&RpcError> {
        match self {
            Cause::Error(err) => Some(err),
            Cause::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Cause::Error(_) => None,
            Cause::Value(value) => Some(value),
        }
    }

    /// The next link of the cause chain
    pub fn cause(&self) -> Option<&Cause> {
        self.as_error().and_then(RpcError::cause)
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Cause::Error(err) => err.describe().to_value(),
            Cause::Value(value) => value.clone(),
        }
    }

    pub fn from_wire(value: Value, procedure_name: &str) -> Self {
        match ErrorDescription::from_value(&value) {
            Some(description) => Cause::Error(Box::new(RpcError::from_description(
                description,
                procedure_name,
            ))),
            None => Cause::Value(value),
        }
    }
}

impl From<RpcError> for Cause {
    fn from(err: RpcError) -> Self {
        Cause::Error(Box::new(err))
    }
}

impl From<ErrorDescription> for Cause {
    /// Rebuilds the description, nested causes included
    fn from(description: ErrorDescription) -> Self {
        Cause::Error(Box::new(RpcError::from_description(description, "")))
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Error(err) => write!(f, "{}: {}", err.name(), err),
            Cause::Value(value) => write!(f, "{}", value),
        }
    }
}

/// The only error `invoke()` ever rejects with
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invocation of remote procedure '{procedure_name}' failed: {cause}")]
pub struct InvocationError {
    pub procedure_name: String,
    pub cause: Cause,
}

impl InvocationError {
    pub const NAME: &'static str = "InvocationError";

    pub fn new(procedure_name: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self {
            procedure_name: procedure_name.into(),
            cause: cause.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Builds the rejection for an error outcome payload
    ///
    /// Described errors are rebuilt with their whole cause chain, so a
    /// handler fault arrives as `EvaluationError` wrapping what was thrown.
    /// Payloads that are not descriptions at all (a deferred rejected with
    /// a raw value) become the raw cause.
    pub fn from_remote(procedure_name: &str, payload: Value) -> Self {
        Self::new(procedure_name, Cause::from_wire(payload, procedure_name))
    }

    pub fn describe(&self) -> ErrorDescription {
        ErrorDescription {
            name: Self::NAME.to_string(),
            message: self.to_string(),
            cause: Some(self.cause.to_wire()),
        }
    }
}

/// Failures while constructing an RPC instance or its configuration
#[derive(Debug, Error)]
pub enum RpcSetupError {
    #[error("Failed to attach listener: {0}")]
    Listen(#[from] ChannelError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Convenience for building the wire value of an error outcome
pub(crate) fn error_payload(err: &RpcError) -> Value {
    err.describe().to_value()
}
