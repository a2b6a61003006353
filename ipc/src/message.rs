//! Message types carried by a channel

use core_types::{ContextId, Origin};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A message as delivered to a listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedMessage {
    /// Context that posted the message
    pub source: ContextId,
    /// Origin of the source context, stamped by the channel
    pub origin: Origin,
    /// Structured-clone payload
    pub data: Value,
}

impl PostedMessage {
    /// Creates a delivered message
    pub fn new(source: ContextId, origin: Origin, data: Value) -> Self {
        Self {
            source,
            origin,
            data,
        }
    }
}

/// Schema version for a protocol layered on the channel
///
/// This enables backward-compatible evolution of message formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u32,
    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl SchemaVersion {
    /// Creates a new schema version
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Checks if this version is compatible with another
    ///
    /// Compatibility rules:
    /// - Same major version = compatible
    /// - Different major version = incompatible
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}
