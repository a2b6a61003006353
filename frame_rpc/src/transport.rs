//! Message transport adapter
//!
//! Sits between one RPC instance and the shared channel. Outbound, it
//! encodes envelopes and posts them from its own context. Inbound, it
//! drains its listener and keeps only traffic that decodes as this
//! protocol; everything else sharing the channel is skipped.

use crate::envelope::{self, DecodeRejection, Envelope};
use crate::error::RpcError;
use core_types::{ContextId, Origin};
use ipc::{ChannelError, Inbox, MessageChannel};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// A decoded inbound envelope and where it came from
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Inbound {
    pub source: ContextId,
    pub origin: Origin,
    pub envelope: Envelope,
}

pub(crate) struct TransportAdapter {
    context: ContextId,
    channel: Rc<dyn MessageChannel>,
    inbox: Option<Box<dyn Inbox>>,
}

impl TransportAdapter {
    /// Attaches a listener for `context`
    pub fn attach(context: ContextId, channel: Rc<dyn MessageChannel>) -> Result<Self, ChannelError> {
        let inbox = channel.listen(&context)?;
        Ok(Self {
            context,
            channel,
            inbox: Some(inbox),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_none()
    }

    /// Encodes `envelope` and posts it to `target`
    pub fn send(&self, target: &ContextId, envelope: &Envelope) -> Result<(), RpcError> {
        if self.is_closed() {
            return Err(RpcError::channel_closed());
        }

        let data = envelope::encode(envelope).map_err(|err| RpcError::data_clone(&err))?;
        self.channel
            .post(&self.context, target, data)
            .map_err(|err| RpcError::channel(&err))?;

        debug!(
            context = %self.context,
            target = %target,
            kind = envelope.kind(),
            call_id = envelope.id().as_str(),
            "envelope sent"
        );
        Ok(())
    }

    /// Next inbound envelope of this protocol, skipping anything else
    pub fn next_inbound(&mut self) -> Option<Inbound> {
        let context = self.context;
        let inbox = self.inbox.as_mut()?;

        while let Some(message) = inbox.next_message() {
            match envelope::decode(&message.data) {
                Ok(envelope) => {
                    debug!(
                        context = %context,
                        source = %message.source,
                        kind = envelope.kind(),
                        call_id = envelope.id().as_str(),
                        "envelope received"
                    );
                    return Some(Inbound {
                        source: message.source,
                        origin: message.origin,
                        envelope,
                    });
                }
                Err(DecodeRejection::Foreign) => {
                    trace!(context = %context, source = %message.source, "foreign message ignored");
                }
                Err(DecodeRejection::Incompatible(schema)) => {
                    warn!(
                        context = %context,
                        source = %message.source,
                        schema = %schema,
                        "envelope with incompatible schema ignored"
                    );
                }
                Err(DecodeRejection::Malformed(reason)) => {
                    warn!(
                        context = %context,
                        source = %message.source,
                        reason = %reason,
                        "malformed envelope ignored"
                    );
                }
            }
        }
        None
    }

    /// Drops the listener for good
    pub fn detach(&mut self) {
        if self.inbox.take().is_some() {
            debug!(context = %self.context, "listener detached");
        }
    }
}
