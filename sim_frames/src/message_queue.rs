//! Bounded message queue for simulated listeners.
//!
//! Provides deterministic FIFO ordering with explicit capacity limits.

use ipc::PostedMessage;
use std::collections::VecDeque;

/// Queue error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Full,
}

/// Bounded FIFO queue of delivered messages.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    capacity: usize,
    messages: VecDeque<PostedMessage>,
}

impl MessageQueue {
    /// Creates a queue with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Pushes a message onto the queue.
    pub fn push(&mut self, message: PostedMessage) -> Result<(), QueueError> {
        if self.messages.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Pops the next message.
    pub fn pop(&mut self) -> Option<PostedMessage> {
        self.messages.pop_front()
    }
}
