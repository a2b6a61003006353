//! # Simulated Message Bus
//!
//! In-memory [`MessageChannel`] shared by every context of a simulation.
//!
//! Each context is created with an origin, which the bus stamps on every
//! message that context posts. Each `listen()` gets its own FIFO queue;
//! a post copies the message into every live queue of the target context.
//! Dropping an inbox detaches it. Posting to a context nobody listens on
//! loses the message without error.

use crate::fault_injection::{FaultInjector, FaultPlan};
use crate::message_queue::MessageQueue;
use core_types::{ContextId, Origin};
use ipc::{ChannelError, Inbox, MessageChannel, PostedMessage};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Default capacity of one listener queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type SharedQueue = Rc<RefCell<MessageQueue>>;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Posts accepted by the bus
    pub posted: usize,
    /// Copies placed into listener queues
    pub delivered: usize,
    /// Posts removed by fault injection
    pub dropped: usize,
    /// Posts that found no live listener
    pub unheard: usize,
    /// Copies lost to a full listener queue
    pub overflowed: usize,
}

struct ContextEntry {
    origin: Origin,
    listeners: Vec<Weak<RefCell<MessageQueue>>>,
}

impl ContextEntry {
    fn live_listeners(&mut self) -> Vec<SharedQueue> {
        self.listeners.retain(|queue| queue.strong_count() > 0);
        self.listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

#[derive(Default)]
struct BusState {
    contexts: HashMap<ContextId, ContextEntry>,
    injector: Option<FaultInjector>,
    stats: ChannelStats,
}

/// In-memory message bus
pub struct SimChannel {
    queue_capacity: usize,
    state: RefCell<BusState>,
}

impl SimChannel {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            state: RefCell::new(BusState::default()),
        }
    }

    /// Creates a context whose messages carry `origin`
    pub fn create_context(&self, origin: impl Into<Origin>) -> ContextId {
        let context = ContextId::new();
        let origin = origin.into();
        debug!(context = %context, origin = %origin, "context created");
        self.state.borrow_mut().contexts.insert(
            context,
            ContextEntry {
                origin,
                listeners: Vec::new(),
            },
        );
        context
    }

    pub fn origin_of(&self, context: &ContextId) -> Option<Origin> {
        self.state
            .borrow()
            .contexts
            .get(context)
            .map(|entry| entry.origin.clone())
    }

    /// Number of live listeners on `context`
    pub fn listener_count(&self, context: &ContextId) -> usize {
        self.state
            .borrow_mut()
            .contexts
            .get_mut(context)
            .map_or(0, |entry| entry.live_listeners().len())
    }

    /// Messages delivered but not yet read, across all live listeners
    pub fn pending_message_count(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let pending = state
            .contexts
            .values_mut()
            .flat_map(|entry| entry.live_listeners())
            .map(|queue| queue.borrow().len())
            .sum();
        pending
    }

    pub fn stats(&self) -> ChannelStats {
        self.state.borrow().stats
    }

    /// Replaces the active fault plan
    pub fn set_fault_plan(&self, plan: FaultPlan) {
        self.state.borrow_mut().injector = Some(FaultInjector::new(plan));
    }
}

impl Default for SimChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageChannel for SimChannel {
    fn post(&self, source: &ContextId, target: &ContextId, data: Value) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        let origin = state
            .contexts
            .get(source)
            .map(|entry| entry.origin.clone())
            .ok_or(ChannelError::UnknownContext(*source))?;
        if !state.contexts.contains_key(target) {
            return Err(ChannelError::UnknownContext(*target));
        }
        state.stats.posted += 1;

        let dropped = state
            .injector
            .as_mut()
            .is_some_and(|injector| injector.should_drop(target, &data));
        if dropped {
            state.stats.dropped += 1;
            debug!(source = %source, target = %target, "message dropped by fault plan");
            return Ok(());
        }

        let listeners = state
            .contexts
            .get_mut(target)
            .map(ContextEntry::live_listeners)
            .unwrap_or_default();
        if listeners.is_empty() {
            state.stats.unheard += 1;
            trace!(target = %target, "message posted to context without listeners");
            return Ok(());
        }

        for queue in listeners {
            let message = PostedMessage::new(*source, origin.clone(), data.clone());
            match queue.borrow_mut().push(message) {
                Ok(()) => state.stats.delivered += 1,
                Err(_) => state.stats.overflowed += 1,
            }
        }
        Ok(())
    }

    fn listen(&self, context: &ContextId) -> Result<Box<dyn Inbox>, ChannelError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .contexts
            .get_mut(context)
            .ok_or(ChannelError::UnknownContext(*context))?;

        let queue = Rc::new(RefCell::new(MessageQueue::with_capacity(self.queue_capacity)));
        entry.listeners.push(Rc::downgrade(&queue));
        Ok(Box::new(SimInbox { queue }))
    }
}

/// One listener's end of the bus
struct SimInbox {
    queue: SharedQueue,
}

impl Inbox for SimInbox {
    fn next_message(&mut self) -> Option<PostedMessage> {
        self.queue.borrow_mut().pop()
    }
}
