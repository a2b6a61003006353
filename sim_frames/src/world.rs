//! # Simulated World
//!
//! Owns the virtual clock and the message bus, creates contexts and RPC
//! instances on them, and drives every instance it knows about.
//!
//! Time never moves on its own. [`SimWorld::run_until_idle`] polls until no
//! instance has anything left to do at the current instant, and
//! [`SimWorld::advance`] walks the clock forward through every timer
//! deadline on the way, so timeouts fire at their exact virtual time.

use crate::channel::SimChannel;
use crate::clock::SimClock;
use crate::fault_injection::FaultPlan;
use core_types::{Clock, ContextId, Duration, Instant, Origin};
use frame_rpc::{Rpc, RpcConfig, RpcSetupError};
use std::rc::Rc;
use tracing::{debug, warn};

/// Upper bound on poll rounds per `run_until_idle`
const MAX_ROUNDS: usize = 10_000;

/// Upper bound on deadline steps per `advance`
const MAX_STEPS: usize = 100_000;

pub struct SimWorld {
    clock: Rc<SimClock>,
    channel: Rc<SimChannel>,
    instances: Vec<Rpc>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            clock: Rc::new(SimClock::new()),
            channel: Rc::new(SimChannel::new()),
            instances: Vec::new(),
        }
    }

    /// Starts the world with a fault plan already active
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.channel.set_fault_plan(plan);
        self
    }

    pub fn clock(&self) -> Rc<SimClock> {
        Rc::clone(&self.clock)
    }

    pub fn channel(&self) -> Rc<SimChannel> {
        Rc::clone(&self.channel)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn create_context(&self, origin: impl Into<Origin>) -> ContextId {
        self.channel.create_context(origin)
    }

    /// Creates a context and an RPC instance listening on it
    pub fn spawn_rpc(&mut self, origin: impl Into<Origin>, config: RpcConfig) -> Result<Rpc, RpcSetupError> {
        let context = self.create_context(origin);
        self.attach_rpc(context, config)
    }

    /// Creates an additional RPC instance on an existing context
    pub fn attach_rpc(&mut self, context: ContextId, config: RpcConfig) -> Result<Rpc, RpcSetupError> {
        let rpc = Rpc::new(context, self.channel.clone(), self.clock.clone(), config)?;
        self.instances.push(rpc.clone());
        Ok(rpc)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Polls every instance until none has work at the current instant
    ///
    /// Returns the number of events processed.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_ROUNDS {
            let events: usize = self.instances.iter().map(Rpc::poll).sum();
            if events == 0 {
                return total;
            }
            total += events;
        }
        warn!(rounds = MAX_ROUNDS, "simulation did not become idle");
        total
    }

    /// Earliest armed timer across all instances
    pub fn next_deadline(&self) -> Option<Instant> {
        self.instances.iter().filter_map(Rpc::next_deadline).min()
    }

    /// Moves time forward by `duration`, stopping at every deadline
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.now() + duration;
        let mut total = self.run_until_idle();

        for _ in 0..MAX_STEPS {
            match self.next_deadline() {
                Some(deadline) if deadline <= target => {
                    self.clock.set(deadline);
                    debug!(now = %self.now(), "advanced to deadline");
                    total += self.run_until_idle();
                }
                _ => break,
            }
        }

        self.clock.set(target);
        total + self.run_until_idle()
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
