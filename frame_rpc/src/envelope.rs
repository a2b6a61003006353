//! Wire envelopes
//!
//! Two kinds travel over the channel: a *Call* naming a procedure, and an
//! *Outcome* answering a previously sent call id. Both carry the protocol
//! marker and schema version so that foreign traffic sharing the channel
//! can be told apart cheaply.

use ipc::SchemaVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Protocol marker carried by every envelope
pub const PROTOCOL: &str = "frame-rpc";

/// Envelope schema version (v1.0)
pub const RPC_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0);

/// Correlation id linking a call to its outcome
///
/// Opaque: peers may use any string, so nothing beyond equality is assumed.
/// Locally generated ids are UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Creates a new random call ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an id received from a peer
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Call({})", self.0)
    }
}

/// Request to run a procedure
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub id: CallId,
    pub procedure_name: String,
    pub args: Value,
}

/// Answer to a call
///
/// `Err` holds the error payload: usually an error description, but any
/// value a peer could not describe is passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeEnvelope {
    pub id: CallId,
    pub result: Result<Value, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Call(CallEnvelope),
    Outcome(OutcomeEnvelope),
}

impl Envelope {
    pub fn id(&self) -> &CallId {
        match self {
            Envelope::Call(call) => &call.id,
            Envelope::Outcome(outcome) => &outcome.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Call(_) => "call",
            Envelope::Outcome(_) => "outcome",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutcomeStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Body {
    Call {
        id: CallId,
        #[serde(rename = "procedureName")]
        procedure_name: String,
        #[serde(default)]
        args: Value,
    },
    Outcome {
        id: CallId,
        status: OutcomeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    protocol: String,
    schema: SchemaVersion,
    #[serde(flatten)]
    body: Body,
}

/// Why an inbound value was not accepted as an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeRejection {
    /// Not addressed to this protocol at all
    Foreign,
    /// Our marker, but a schema major version we do not speak
    Incompatible(SchemaVersion),
    /// Our marker, but the body does not parse
    Malformed(String),
}

/// Encodes an envelope into its channel payload
pub fn encode(envelope: &Envelope) -> Result<Value, serde_json::Error> {
    let body = match envelope.clone() {
        Envelope::Call(call) => Body::Call {
            id: call.id,
            procedure_name: call.procedure_name,
            args: call.args,
        },
        Envelope::Outcome(outcome) => match outcome.result {
            Ok(value) => Body::Outcome {
                id: outcome.id,
                status: OutcomeStatus::Success,
                value: Some(value),
                error: None,
            },
            Err(error) => Body::Outcome {
                id: outcome.id,
                status: OutcomeStatus::Error,
                value: None,
                error: Some(error),
            },
        },
    };

    serde_json::to_value(WireEnvelope {
        protocol: PROTOCOL.to_string(),
        schema: RPC_SCHEMA,
        body,
    })
}

/// Decodes a channel payload
pub fn decode(data: &Value) -> Result<Envelope, DecodeRejection> {
    if data.get("protocol").and_then(Value::as_str) != Some(PROTOCOL) {
        return Err(DecodeRejection::Foreign);
    }

    let wire = WireEnvelope::deserialize(data)
        .map_err(|err| DecodeRejection::Malformed(err.to_string()))?;
    if !wire.schema.is_compatible_with(&RPC_SCHEMA) {
        return Err(DecodeRejection::Incompatible(wire.schema));
    }

    Ok(match wire.body {
        Body::Call {
            id,
            procedure_name,
            args,
        } => Envelope::Call(CallEnvelope {
            id,
            procedure_name,
            args,
        }),
        Body::Outcome {
            id,
            status,
            value,
            error,
        } => Envelope::Outcome(OutcomeEnvelope {
            id,
            // a JSON null decodes as a missing field
            result: match status {
                OutcomeStatus::Success => Ok(value.unwrap_or(Value::Null)),
                OutcomeStatus::Error => Err(error.unwrap_or(Value::Null)),
            },
        }),
    })
}
