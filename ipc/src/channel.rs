//! Channel abstraction for message passing between contexts

use crate::PostedMessage;
use core_types::ContextId;
use serde_json::Value;
use thiserror::Error;

/// Errors reported synchronously by a channel
///
/// Asynchronous loss is never reported: the channel is best effort.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The context is not known to this channel
    #[error("Unknown context: {0}")]
    UnknownContext(ContextId),

    /// The channel refused the payload
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// A bidirectional, best-effort, order-preserving message pipe
///
/// Implementations stamp every delivered message with the source context
/// and its origin. Posting to a context that has no live listener is not an
/// error: the message is dropped, as a real frame would drop it.
pub trait MessageChannel {
    /// Posts `data` from `source` to every listener of `target`
    fn post(&self, source: &ContextId, target: &ContextId, data: Value)
        -> Result<(), ChannelError>;

    /// Attaches a new listener to `context`
    ///
    /// The listener stays attached until the returned inbox is dropped.
    fn listen(&self, context: &ContextId) -> Result<Box<dyn Inbox>, ChannelError>;
}

/// Receiving end of one listener
pub trait Inbox {
    /// Pops the next delivered message, if any
    fn next_message(&mut self) -> Option<PostedMessage>;
}
