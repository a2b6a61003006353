//! Invocation tracker
//!
//! Owns every outstanding call made by one instance: its correlation id,
//! serialized call, timer and retry budget. An invocation leaves the table
//! exactly once, and the [`Settled`] value handed back for it is the only
//! thing that settles the caller's result.
//!
//! The tracker never touches the channel or runs user code. Sending and
//! delivering settlements is left to the instance, which does both outside
//! of its internal borrow.

use crate::config::DefaultInvocationOptions;
use crate::envelope::{CallEnvelope, CallId, Envelope, OutcomeEnvelope};
use crate::error::{InvocationError, RpcError};
use crate::pending::{InvocationResult, PendingInvocation, Settlement};
use core_types::{ContextId, Duration, Instant, Origin, OriginFilter};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvocationState {
    /// Waiting for the instance to hand the call to the channel
    PendingSend,
    /// Sent; the timer is armed when a timeout applies
    AwaitingResponse,
}

struct Invocation {
    seq: u64,
    procedure_name: String,
    target: ContextId,
    origin_filter: OriginFilter,
    call: Envelope,
    timeout_ms: i64,
    retries_remaining: u32,
    attempts: u32,
    deadline: Option<Instant>,
    state: InvocationState,
    settlement: Settlement<InvocationResult>,
}

/// A settlement that is ready to be delivered to the caller
#[must_use]
pub(crate) struct Settled {
    id: CallId,
    settlement: Settlement<InvocationResult>,
    result: InvocationResult,
}

impl Settled {
    /// Settles the caller's result, running its callbacks
    pub fn deliver(self) {
        debug!(
            call_id = self.id.as_str(),
            ok = self.result.is_ok(),
            "invocation settled"
        );
        self.settlement.settle(self.result);
    }
}

/// What a timer produced
pub(crate) enum TimerEvent {
    /// Re-send this call under the same id
    Retry {
        id: CallId,
        target: ContextId,
        call: Envelope,
    },
    /// Retries exhausted
    Expired(Settled),
}

/// Everything needed to send the first attempt of a new invocation
pub(crate) struct Started {
    pub id: CallId,
    pub target: ContextId,
    pub call: Envelope,
    pub pending: PendingInvocation,
}

#[derive(Default)]
pub(crate) struct InvocationTracker {
    pending: HashMap<CallId, Invocation>,
    next_seq: u64,
}

impl InvocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new invocation in the pending-send state
    pub fn begin(
        &mut self,
        target: ContextId,
        origin_filter: OriginFilter,
        procedure_name: &str,
        args: Value,
        options: DefaultInvocationOptions,
    ) -> Started {
        let id = loop {
            let id = CallId::new();
            if !self.pending.contains_key(&id) {
                break id;
            }
        };

        let call = Envelope::Call(CallEnvelope {
            id: id.clone(),
            procedure_name: procedure_name.to_string(),
            args,
        });
        let settlement = Settlement::new();
        let pending = PendingInvocation::new(id.clone(), procedure_name.to_string(), settlement.clone());

        self.next_seq += 1;
        self.pending.insert(
            id.clone(),
            Invocation {
                seq: self.next_seq,
                procedure_name: procedure_name.to_string(),
                target,
                origin_filter,
                call: call.clone(),
                timeout_ms: options.timeout_ms,
                retries_remaining: options.retry_limit,
                attempts: 0,
                deadline: None,
                state: InvocationState::PendingSend,
                settlement,
            },
        );

        Started {
            id,
            target,
            call,
            pending,
        }
    }

    /// Marks an attempt as sent at `now` and arms its timer
    pub fn mark_sent(&mut self, id: &CallId, now: Instant) {
        if let Some(invocation) = self.pending.get_mut(id) {
            invocation.attempts += 1;
            invocation.state = InvocationState::AwaitingResponse;
            invocation.deadline = u64::try_from(invocation.timeout_ms)
                .ok()
                .filter(|ms| *ms > 0)
                .map(|ms| now + Duration::from_millis(ms));
            debug!(
                call_id = id.as_str(),
                procedure = invocation.procedure_name.as_str(),
                attempt = invocation.attempts,
                "call sent"
            );
        }
    }

    /// Settles an invocation whose attempt could not be sent
    pub fn fail(&mut self, id: &CallId, error: RpcError) -> Option<Settled> {
        let invocation = self.pending.remove(id)?;
        Some(Settled {
            id: id.clone(),
            result: Err(InvocationError::new(invocation.procedure_name, error)),
            settlement: invocation.settlement,
        })
    }

    /// Matches an inbound outcome to its invocation
    ///
    /// Outcomes for unknown ids, from a context other than the call's
    /// target, or from an origin the filter rejects are ignored.
    pub fn on_outcome(
        &mut self,
        source: &ContextId,
        origin: &Origin,
        outcome: OutcomeEnvelope,
    ) -> Option<Settled> {
        let Some(invocation) = self.pending.get(&outcome.id) else {
            trace!(call_id = outcome.id.as_str(), "outcome for unknown call ignored");
            return None;
        };
        if invocation.target != *source || !invocation.origin_filter.accepts(origin) {
            debug!(
                call_id = outcome.id.as_str(),
                source = %source,
                origin = %origin,
                "outcome from unexpected sender ignored"
            );
            return None;
        }

        let invocation = self.pending.remove(&outcome.id)?;
        let result = outcome
            .result
            .map_err(|payload| InvocationError::from_remote(&invocation.procedure_name, payload));
        Some(Settled {
            id: outcome.id,
            settlement: invocation.settlement,
            result,
        })
    }

    /// Fires every timer whose deadline is at or before `now`
    ///
    /// Events come out in deadline order, ties broken by invocation age.
    pub fn expire(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut due: Vec<(Instant, u64, CallId)> = self
            .pending
            .iter()
            .filter(|(_, invocation)| invocation.state == InvocationState::AwaitingResponse)
            .filter_map(|(id, invocation)| {
                invocation
                    .deadline
                    .filter(|deadline| *deadline <= now)
                    .map(|deadline| (deadline, invocation.seq, id.clone()))
            })
            .collect();
        due.sort_by_key(|(deadline, seq, _)| (*deadline, *seq));

        let mut events = Vec::with_capacity(due.len());
        for (_, _, id) in due {
            let Some(invocation) = self.pending.get_mut(&id) else {
                continue;
            };

            if invocation.retries_remaining > 0 {
                invocation.retries_remaining -= 1;
                invocation.state = InvocationState::PendingSend;
                invocation.deadline = None;
                debug!(
                    call_id = id.as_str(),
                    procedure = invocation.procedure_name.as_str(),
                    retries_remaining = invocation.retries_remaining,
                    "call timed out, retrying"
                );
                events.push(TimerEvent::Retry {
                    target: invocation.target,
                    call: invocation.call.clone(),
                    id,
                });
            } else if let Some(invocation) = self.pending.remove(&id) {
                let error = RpcError::Timeout {
                    procedure_name: invocation.procedure_name.clone(),
                    timeout_ms: invocation.timeout_ms,
                };
                events.push(TimerEvent::Expired(Settled {
                    result: Err(InvocationError::new(invocation.procedure_name, error)),
                    settlement: invocation.settlement,
                    id,
                }));
            }
        }
        events
    }

    /// Settles an invocation as cancelled
    pub fn cancel(&mut self, id: &CallId) -> Option<Settled> {
        let invocation = self.pending.remove(id)?;
        let error = RpcError::Cancelled {
            procedure_name: invocation.procedure_name.clone(),
        };
        Some(Settled {
            id: id.clone(),
            result: Err(InvocationError::new(invocation.procedure_name, error)),
            settlement: invocation.settlement,
        })
    }

    /// Earliest armed deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .filter_map(|invocation| invocation.deadline)
            .min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
