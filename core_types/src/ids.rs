//! Identifiers for contexts and their origins

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an execution context
///
/// A context is an isolated environment (a host document or an embedded
/// frame) that can only be reached through message passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Creates a new random context ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a context ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.0)
    }
}

/// Security origin of a context (scheme + host + port, e.g. `https://app.example`)
///
/// Origins are compared as exact strings. No normalisation happens here;
/// whoever creates a context decides its canonical origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(String);

impl Origin {
    /// Creates an origin from its serialized form
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    /// Returns the origin as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Origin {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Filter applied to the origin of inbound messages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OriginFilter {
    /// Accept messages from any origin
    #[default]
    Any,
    /// Accept messages only from this exact origin
    Exact(Origin),
}

impl OriginFilter {
    /// Creates a filter accepting only `origin`
    pub fn exact(origin: impl Into<Origin>) -> Self {
        OriginFilter::Exact(origin.into())
    }

    /// Checks whether a message from `origin` passes this filter
    pub fn accepts(&self, origin: &Origin) -> bool {
        match self {
            OriginFilter::Any => true,
            OriginFilter::Exact(expected) => expected == origin,
        }
    }
}

impl fmt::Display for OriginFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginFilter::Any => f.write_str("*"),
            OriginFilter::Exact(origin) => write!(f, "{}", origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_creation() {
        let id1 = ContextId::new();
        let id2 = ContextId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_context_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ContextId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_context_id_display() {
        let id = ContextId::new();
        let display = format!("{}", id);
        assert!(display.starts_with("Context("));
    }

    #[test]
    fn test_origin_filter_any() {
        let filter = OriginFilter::default();
        assert!(filter.accepts(&Origin::from("https://host.example")));
        assert!(filter.accepts(&Origin::from("null")));
        assert_eq!(filter.to_string(), "*");
    }

    #[test]
    fn test_origin_filter_exact() {
        let filter = OriginFilter::exact("https://host.example");
        assert!(filter.accepts(&Origin::from("https://host.example")));
        assert!(!filter.accepts(&Origin::from("https://host.example:8443")));
        assert!(!filter.accepts(&Origin::from("https://evil.example")));
    }

    #[test]
    fn test_origin_filter_serialization() {
        let filter = OriginFilter::exact("https://child.example");
        let json = serde_json::to_string(&filter).unwrap();
        let back: OriginFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }
}
