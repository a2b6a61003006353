//! Responder
//!
//! Turns what a handler produced into an Outcome for the caller. Handlers
//! themselves are run by the instance so that no internal state is
//! borrowed while user code executes; the responder only classifies
//! results, sends replies, and keeps deferred results until they settle.

use crate::envelope::{CallId, Envelope, OutcomeEnvelope};
use crate::error::{error_payload, Cause, RpcError};
use crate::pending::{Deferred, DeferredOutcome};
use crate::registry::{HandlerResult, ReplyKind};
use crate::transport::TransportAdapter;
use core_types::ContextId;
use serde_json::Value;
use tracing::{debug, warn};

/// Where a handler result stands
pub(crate) enum Conclusion {
    Ready(Result<Value, Value>),
    Pending(Deferred),
}

/// A deferred handler result waiting to be answered
struct InFlight {
    id: CallId,
    caller: ContextId,
    procedure_name: String,
    deferred: Deferred,
}

#[derive(Default)]
pub(crate) struct Responder {
    in_flight: Vec<InFlight>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome for a name with no live handler
    pub fn not_found(procedure_name: &str) -> Result<Value, Value> {
        Err(error_payload(&RpcError::ProcedureNotFound {
            procedure_name: procedure_name.to_string(),
        }))
    }

    /// Classifies a handler's return
    pub fn conclude(result: HandlerResult) -> Conclusion {
        match result {
            Err(cause) => Conclusion::Ready(Err(error_payload(&RpcError::evaluation(cause)))),
            Ok(reply) => match reply.0 {
                ReplyKind::Value(value) => Conclusion::Ready(Ok(value)),
                ReplyKind::Unserializable(reason) => {
                    Conclusion::Ready(Err(error_payload(&RpcError::data_clone(&reason))))
                }
                ReplyKind::Deferred(deferred) => match deferred.outcome() {
                    Some(outcome) => Conclusion::Ready(Self::settled(outcome)),
                    None => Conclusion::Pending(deferred),
                },
            },
        }
    }

    /// Outcome for a settled deferred
    ///
    /// A rejection with a raw value travels as that value, unwrapped; a
    /// described rejection is an `EvaluationError` like a synchronous fault.
    fn settled(outcome: DeferredOutcome) -> Result<Value, Value> {
        match outcome {
            DeferredOutcome::Resolved(value) => Ok(value),
            DeferredOutcome::Unserializable(reason) => {
                Err(error_payload(&RpcError::data_clone(&reason)))
            }
            DeferredOutcome::Rejected(Cause::Value(raw)) => Err(raw),
            DeferredOutcome::Rejected(cause) => Err(error_payload(&RpcError::evaluation(cause))),
        }
    }

    /// Sends the outcome of call `id` back to `caller`
    ///
    /// A success that the channel refuses is answered with the failure
    /// instead; anything that still cannot be sent is dropped.
    pub fn reply(
        adapter: &TransportAdapter,
        caller: &ContextId,
        id: CallId,
        procedure_name: &str,
        result: Result<Value, Value>,
    ) {
        let succeeded = result.is_ok();
        let outcome = Envelope::Outcome(OutcomeEnvelope {
            id: id.clone(),
            result,
        });

        let err = match adapter.send(caller, &outcome) {
            Ok(()) => return,
            Err(err) => err,
        };

        if succeeded && !adapter.is_closed() {
            let fallback = Envelope::Outcome(OutcomeEnvelope {
                id: id.clone(),
                result: Err(error_payload(&err)),
            });
            if adapter.send(caller, &fallback).is_ok() {
                debug!(
                    call_id = id.as_str(),
                    procedure = procedure_name,
                    "success outcome refused, reported failure instead"
                );
                return;
            }
        }

        warn!(
            call_id = id.as_str(),
            procedure = procedure_name,
            error = %err,
            "outcome dropped"
        );
    }

    /// Keeps a deferred result until it settles
    ///
    /// A deferred nobody can settle any more is not kept; its caller is
    /// left to time out.
    pub fn track(&mut self, id: CallId, caller: ContextId, procedure_name: &str, deferred: Deferred) {
        if deferred.is_abandoned() {
            debug!(
                call_id = id.as_str(),
                procedure = procedure_name,
                "deferred result without resolver, no reply will be sent"
            );
            return;
        }
        self.in_flight.push(InFlight {
            id,
            caller,
            procedure_name: procedure_name.to_string(),
            deferred,
        });
    }

    /// Answers every deferred result that has settled, in arrival order
    pub fn flush(&mut self, adapter: &TransportAdapter) -> usize {
        let mut answered = 0;
        let mut waiting = Vec::with_capacity(self.in_flight.len());

        for entry in self.in_flight.drain(..) {
            match entry.deferred.outcome() {
                Some(outcome) => {
                    Self::reply(
                        adapter,
                        &entry.caller,
                        entry.id,
                        &entry.procedure_name,
                        Self::settled(outcome),
                    );
                    answered += 1;
                }
                None if entry.deferred.is_abandoned() => {
                    debug!(
                        call_id = entry.id.as_str(),
                        procedure = entry.procedure_name.as_str(),
                        "resolver dropped, no reply will be sent"
                    );
                }
                None => waiting.push(entry),
            }
        }

        self.in_flight = waiting;
        answered
    }

    /// Forgets every unanswered deferred result
    pub fn abandon(&mut self) -> usize {
        let dropped = self.in_flight.len();
        self.in_flight.clear();
        dropped
    }
}
