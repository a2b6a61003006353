//! Test utilities for the protocol core
//!
//! A minimal in-memory channel and a hand-driven clock, enough to exercise
//! the adapter and the instance without the full simulation crate.

use core_types::{Clock, ContextId, Duration, Instant, Origin};
use ipc::{ChannelError, Inbox, MessageChannel, PostedMessage};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

type Queue = Rc<RefCell<VecDeque<PostedMessage>>>;

/// In-memory channel delivering posts synchronously to live listeners
#[derive(Default)]
pub struct Loopback {
    listeners: RefCell<HashMap<ContextId, Vec<Weak<RefCell<VecDeque<PostedMessage>>>>>>,
    origins: RefCell<HashMap<ContextId, Origin>>,
    posted: Cell<usize>,
    refuse: Cell<bool>,
}

impl Loopback {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_origin(&self, context: ContextId, origin: impl Into<Origin>) {
        self.origins.borrow_mut().insert(context, origin.into());
    }

    /// Makes every later post fail synchronously
    pub fn refuse_posts(&self, refuse: bool) {
        self.refuse.set(refuse);
    }

    pub fn posted(&self) -> usize {
        self.posted.get()
    }
}

impl MessageChannel for Loopback {
    fn post(&self, source: &ContextId, target: &ContextId, data: Value) -> Result<(), ChannelError> {
        if self.refuse.get() {
            return Err(ChannelError::Rejected("refused by test".to_string()));
        }
        self.posted.set(self.posted.get() + 1);

        let origin = self
            .origins
            .borrow()
            .get(source)
            .cloned()
            .unwrap_or_else(|| Origin::new("null"));
        let mut listeners = self.listeners.borrow_mut();
        if let Some(queues) = listeners.get_mut(target) {
            queues.retain(|queue| queue.strong_count() > 0);
            for queue in queues.iter().filter_map(Weak::upgrade) {
                queue
                    .borrow_mut()
                    .push_back(PostedMessage::new(*source, origin.clone(), data.clone()));
            }
        }
        Ok(())
    }

    fn listen(&self, context: &ContextId) -> Result<Box<dyn Inbox>, ChannelError> {
        let queue: Queue = Rc::new(RefCell::new(VecDeque::new()));
        self.listeners
            .borrow_mut()
            .entry(*context)
            .or_default()
            .push(Rc::downgrade(&queue));
        Ok(Box::new(LoopbackInbox { queue }))
    }
}

struct LoopbackInbox {
    queue: Queue,
}

impl Inbox for LoopbackInbox {
    fn next_message(&mut self) -> Option<PostedMessage> {
        self.queue.borrow_mut().pop_front()
    }
}

/// Clock that only moves when told to
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
