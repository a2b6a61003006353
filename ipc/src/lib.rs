//! # Inter-Context Messaging
//!
//! This crate defines the raw message pipe between two execution contexts.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: Contexts never share state; every
//!   interaction is a posted message
//! - **Best effort**: A posted message is delivered or silently dropped,
//!   never duplicated or reordered
//! - **Structured payloads**: Payloads are JSON values, the result of a
//!   structured clone on the sending side
//! - **Stamped origins**: The channel, not the sender, attaches the
//!   source context and origin to every delivered message
//!
//! ## Architecture
//!
//! A [`MessageChannel`] is shared by every listener in the system. Each
//! listener owns an [`Inbox`] scoped to one context; dropping the inbox
//! detaches the listener. Protocols layered on top (such as frame_rpc)
//! must tolerate foreign messages arriving in the same inbox.

pub mod channel;
pub mod message;

pub use channel::{ChannelError, Inbox, MessageChannel};
pub use message::{PostedMessage, SchemaVersion};
