//! RPC instance
//!
//! [`Rpc`] binds the registry, tracker, responder and transport adapter of
//! one context into the public `register`/`invoke`/`close` surface.
//!
//! ## Driving
//!
//! Nothing happens in the background. The owner calls [`Rpc::poll`], which
//! drains the inbox, fires due timers and answers settled deferred results.
//! [`Rpc::next_deadline`] tells a driver how far it may let time run before
//! the next poll is due.
//!
//! ## Re-entrancy
//!
//! Handlers and settle callbacks run with no internal borrow held, so they
//! may call back into the same instance (including `close()`).

use crate::config::{InvocationOptions, RpcConfig};
use crate::envelope::{CallEnvelope, CallId, Envelope};
use crate::error::{InvocationError, RpcError, RpcSetupError};
use crate::pending::PendingInvocation;
use crate::registry::{Args, Handler, HandlerResult, ProcedureRegistry};
use crate::responder::{Conclusion, Responder};
use crate::tracker::{InvocationTracker, TimerEvent};
use crate::transport::{Inbound, TransportAdapter};
use core_types::{Clock, ContextId, Instant, OriginFilter};
use ipc::MessageChannel;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Name of the built-in procedure that closes the receiving instance
pub const CLOSE_PROCEDURE: &str = "close";

struct RpcInner {
    config: RpcConfig,
    registry: ProcedureRegistry,
    tracker: InvocationTracker,
    responder: Responder,
    adapter: TransportAdapter,
}

/// One RPC endpoint, bound to one context
///
/// Cloning is cheap; clones share the same instance.
#[derive(Clone)]
pub struct Rpc {
    context: ContextId,
    clock: Rc<dyn Clock>,
    inner: Rc<RefCell<RpcInner>>,
}

impl Rpc {
    /// Creates an instance listening on `context`
    pub fn new(
        context: ContextId,
        channel: Rc<dyn MessageChannel>,
        clock: Rc<dyn Clock>,
        config: RpcConfig,
    ) -> Result<Rpc, RpcSetupError> {
        let adapter = TransportAdapter::attach(context, channel)?;
        debug!(
            context = %context,
            timeout_ms = config.default_invocation_options.timeout_ms,
            retry_limit = config.default_invocation_options.retry_limit,
            "rpc instance created"
        );

        Ok(Rpc {
            context,
            clock,
            inner: Rc::new(RefCell::new(RpcInner {
                config,
                registry: ProcedureRegistry::new(),
                tracker: InvocationTracker::new(),
                responder: Responder::new(),
                adapter,
            })),
        })
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn config(&self) -> RpcConfig {
        self.inner.borrow().config
    }

    /// Registers `handler` under `name`; `None` removes the name
    ///
    /// The built-in `close` procedure cannot be replaced.
    pub fn register<H>(&self, name: &str, handler: Option<H>)
    where
        H: Fn(Args) -> HandlerResult + 'static,
    {
        self.register_handler(name, handler.map(|handler| Rc::new(handler) as Handler));
    }

    /// Same as [`register`](Self::register), for an already shared handler
    ///
    /// Takes `None` without naming a handler type, and lets one handler
    /// serve several names.
    pub fn register_handler(&self, name: &str, handler: Option<Handler>) {
        if name == CLOSE_PROCEDURE {
            warn!(context = %self.context, procedure = name, "reserved procedure name refused");
            return;
        }

        let registered = handler.is_some();
        self.inner.borrow_mut().registry.register(name, handler);
        debug!(context = %self.context, procedure = name, registered, "registration changed");
    }

    pub fn unregister(&self, name: &str) {
        self.register_handler(name, None);
    }

    /// Names with a live handler, sorted
    pub fn registered_procedures(&self) -> Vec<String> {
        self.inner.borrow().registry.names()
    }

    /// Invokes `procedure_name` on `target`
    ///
    /// `args` is cloned across the boundary now; a sequence arrives as
    /// positional arguments, anything else as a single argument. The result
    /// settles on a later [`poll`](Self::poll), except for failures that are
    /// known immediately (an empty name, unserializable arguments, a channel
    /// that refuses the send), which come back already settled.
    pub fn invoke<A: Serialize>(
        &self,
        target: &ContextId,
        origin_filter: Option<OriginFilter>,
        procedure_name: &str,
        args: A,
        options: InvocationOptions,
    ) -> PendingInvocation {
        if procedure_name.is_empty() {
            return PendingInvocation::rejected(
                CallId::new(),
                InvocationError::new(procedure_name, RpcError::InvalidProcedureName),
            );
        }

        let args = match serde_json::to_value(&args) {
            Ok(args) => args,
            Err(err) => {
                debug!(procedure = procedure_name, error = %err, "arguments cannot be cloned");
                return PendingInvocation::rejected(
                    CallId::new(),
                    InvocationError::new(procedure_name, RpcError::data_clone(&err)),
                );
            }
        };

        let started = {
            let mut inner = self.inner.borrow_mut();
            let options = options.merge(&inner.config.default_invocation_options);
            inner.tracker.begin(
                *target,
                origin_filter.unwrap_or_default(),
                procedure_name,
                args,
                options,
            )
        };

        self.send_attempt(&started.id, &started.target, &started.call);
        started.pending
    }

    /// Settles a pending invocation with an `AbortError`
    ///
    /// Returns false when the id is not pending. A late outcome for the id
    /// is ignored.
    pub fn cancel(&self, id: &CallId) -> bool {
        let settled = self.inner.borrow_mut().tracker.cancel(id);
        match settled {
            Some(settled) => {
                settled.deliver();
                true
            }
            None => false,
        }
    }

    /// Detaches from the channel for good
    ///
    /// Pending invocations are left to their own timers. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.adapter.is_closed() {
            return;
        }
        inner.adapter.detach();
        let abandoned = inner.responder.abandon();
        debug!(
            context = %self.context,
            pending = inner.tracker.len(),
            abandoned,
            "rpc instance closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().adapter.is_closed()
    }

    /// Number of invocations still waiting to settle
    pub fn pending_invocations(&self) -> usize {
        self.inner.borrow().tracker.len()
    }

    /// Processes everything that is due; returns the number of events
    pub fn poll(&self) -> usize {
        let mut events = 0;

        loop {
            let inbound = self.inner.borrow_mut().adapter.next_inbound();
            let Some(inbound) = inbound else {
                break;
            };
            self.dispatch(inbound);
            events += 1;
        }

        let now = self.clock.now();
        let timers = self.inner.borrow_mut().tracker.expire(now);
        for event in timers {
            events += 1;
            match event {
                TimerEvent::Retry { id, target, call } => self.send_attempt(&id, &target, &call),
                TimerEvent::Expired(settled) => settled.deliver(),
            }
        }

        let answered = {
            let mut inner = self.inner.borrow_mut();
            let RpcInner {
                responder, adapter, ..
            } = &mut *inner;
            responder.flush(adapter)
        };
        events + answered
    }

    /// Earliest instant at which a poll has timer work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.borrow().tracker.next_deadline()
    }

    fn send_attempt(&self, id: &CallId, target: &ContextId, call: &Envelope) {
        let sent = self.inner.borrow().adapter.send(target, call);
        let settled = match sent {
            Ok(()) => {
                let now = self.clock.now();
                self.inner.borrow_mut().tracker.mark_sent(id, now);
                None
            }
            Err(err) => {
                debug!(call_id = id.as_str(), error = %err, "call could not be sent");
                self.inner.borrow_mut().tracker.fail(id, err)
            }
        };
        if let Some(settled) = settled {
            settled.deliver();
        }
    }

    fn dispatch(&self, inbound: Inbound) {
        match inbound.envelope {
            Envelope::Call(call) => self.respond(inbound.source, call),
            Envelope::Outcome(outcome) => {
                let settled =
                    self.inner
                        .borrow_mut()
                        .tracker
                        .on_outcome(&inbound.source, &inbound.origin, outcome);
                if let Some(settled) = settled {
                    settled.deliver();
                }
            }
        }
    }

    fn respond(&self, caller: ContextId, call: CallEnvelope) {
        let CallEnvelope {
            id,
            procedure_name,
            args,
        } = call;

        if procedure_name == CLOSE_PROCEDURE {
            self.reply(&caller, id, &procedure_name, Ok(Value::Null));
            self.close();
            return;
        }

        let handler = self.inner.borrow().registry.lookup(&procedure_name);
        let Some(handler) = handler else {
            debug!(call_id = id.as_str(), procedure = %procedure_name, "procedure not found");
            self.reply(&caller, id, &procedure_name, Responder::not_found(&procedure_name));
            return;
        };

        match Responder::conclude(handler(Args::from_wire(args))) {
            Conclusion::Ready(result) => self.reply(&caller, id, &procedure_name, result),
            Conclusion::Pending(deferred) => {
                let mut inner = self.inner.borrow_mut();
                if inner.adapter.is_closed() {
                    // the handler closed this instance; nobody is left to answer
                    return;
                }
                inner
                    .responder
                    .track(id, caller, &procedure_name, deferred);
            }
        }
    }

    fn reply(&self, caller: &ContextId, id: CallId, procedure_name: &str, result: Result<Value, Value>) {
        let inner = self.inner.borrow();
        Responder::reply(&inner.adapter, caller, id, procedure_name, result);
    }
}

impl fmt::Debug for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpc")
            .field("context", &self.context)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_invocations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Cause;
    use crate::pending::Deferred;
    use crate::registry::Reply;
    use crate::test_utils::{Loopback, ManualClock};
    use core_types::Duration;
    use serde_json::json;
    use std::cell::Cell;

    struct Pair {
        channel: Rc<Loopback>,
        clock: Rc<ManualClock>,
        host: Rpc,
        child: Rpc,
    }

    impl Pair {
        fn new(config: RpcConfig) -> Self {
            let channel = Loopback::new();
            let clock = ManualClock::new();
            let host = Rpc::new(ContextId::new(), channel.clone(), clock.clone(), config).unwrap();
            let child = Rpc::new(ContextId::new(), channel.clone(), clock.clone(), config).unwrap();
            Self {
                channel,
                clock,
                host,
                child,
            }
        }

        fn settle(&self) {
            while self.host.poll() + self.child.poll() > 0 {}
        }

        fn advance(&self, millis: u64) {
            self.clock.advance(Duration::from_millis(millis));
            self.settle();
        }
    }

    fn sum(args: Args) -> HandlerResult {
        let values: Vec<i64> = args.arg(0)?;
        Ok(Reply::value(&values.iter().sum::<i64>()))
    }

    #[test]
    fn test_invoke_round_trip() {
        let pair = Pair::new(RpcConfig::default());
        pair.child.register("sum", Some(sum));

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "sum",
            json!([[1, 2, 3]]),
            InvocationOptions::new(),
        );
        assert!(!pending.is_settled());
        assert_eq!(pair.host.pending_invocations(), 1);

        pair.settle();
        assert_eq!(pending.result(), Some(Ok(json!(6))));
        assert_eq!(pair.host.pending_invocations(), 0);
        assert_eq!(pair.host.next_deadline(), None);
    }

    #[test]
    fn test_empty_name_rejects_immediately() {
        let pair = Pair::new(RpcConfig::default());
        let pending = pair
            .host
            .invoke(&pair.child.context(), None, "", (), InvocationOptions::new());

        let err = pending.result().unwrap().unwrap_err();
        assert_eq!(err.cause.name(), Some("TypeError"));
        assert_eq!(pair.channel.posted(), 0);
    }

    #[test]
    fn test_refused_send_rejects_without_timer() {
        let pair = Pair::new(RpcConfig::default());
        pair.channel.refuse_posts(true);

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "sum",
            json!([]),
            InvocationOptions::new(),
        );
        let err = pending.result().unwrap().unwrap_err();
        assert_eq!(err.cause.name(), Some("SendMessageError"));
        assert_eq!(pair.host.next_deadline(), None);
        assert_eq!(pair.host.pending_invocations(), 0);
    }

    #[test]
    fn test_close_cannot_be_registered() {
        let pair = Pair::new(RpcConfig::default());
        pair.child.register("close", Some(sum));
        assert!(pair.child.registered_procedures().is_empty());

        pair.child.register("sum", Some(sum));
        pair.child.unregister("sum");
        assert!(pair.child.registered_procedures().is_empty());
    }

    #[test]
    fn test_shared_handler_serves_several_names() {
        let pair = Pair::new(RpcConfig::default());
        let handler: Handler = Rc::new(sum);
        pair.child.register_handler("sum", Some(Rc::clone(&handler)));
        pair.child.register_handler("total", Some(handler));
        assert_eq!(pair.child.registered_procedures(), vec!["sum", "total"]);

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "total",
            json!([[4, 5]]),
            InvocationOptions::new(),
        );
        pair.settle();
        assert_eq!(pending.result(), Some(Ok(json!(9))));

        pair.child.register_handler("sum", None);
        assert_eq!(pair.child.registered_procedures(), vec!["total"]);
    }

    #[test]
    fn test_builtin_close_replies_then_closes() {
        let pair = Pair::new(RpcConfig::default());
        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "close",
            (),
            InvocationOptions::new(),
        );

        pair.settle();
        assert_eq!(pending.result(), Some(Ok(Value::Null)));
        assert!(pair.child.is_closed());
        assert!(!pair.host.is_closed());
    }

    #[test]
    fn test_close_is_idempotent_and_keeps_pending() {
        let pair = Pair::new(RpcConfig::default().with_default_timeout(100));
        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "never",
            (),
            InvocationOptions::new(),
        );
        pair.child.close();
        pair.host.close();
        pair.host.close();

        assert!(!pending.is_settled());
        pair.advance(100);
        let err = pending.result().unwrap().unwrap_err();
        assert_eq!(err.cause.name(), Some("TimeoutError"));
    }

    #[test]
    fn test_handlers_may_reenter() {
        let pair = Pair::new(RpcConfig::default());
        let child = pair.child.clone();
        let host_context = pair.host.context();
        pair.child.register(
            "relay",
            Some(move |_args: Args| {
                let (deferred, resolver) = Deferred::pair();
                child
                    .invoke(&host_context, None, "answer", (), InvocationOptions::new())
                    .on_settle(move |result| {
                        resolver.settle_with(result);
                    });
                Ok(Reply::deferred(deferred))
            }),
        );
        pair.host
            .register("answer", Some(|_args: Args| Ok(Reply::value(&42))));

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "relay",
            (),
            InvocationOptions::new(),
        );
        pair.settle();
        assert_eq!(pending.result(), Some(Ok(json!(42))));
    }

    #[test]
    fn test_cancel_ignores_late_outcome() {
        let pair = Pair::new(RpcConfig::default());
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        pair.child.register(
            "count",
            Some(move |_args: Args| {
                seen.set(seen.get() + 1);
                Ok(Reply::value(&seen.get()))
            }),
        );

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "count",
            (),
            InvocationOptions::new(),
        );
        assert!(pair.host.cancel(pending.id()));
        assert!(!pair.host.cancel(pending.id()));

        pair.settle();
        assert_eq!(calls.get(), 1);
        let err = pending.result().unwrap().unwrap_err();
        assert_eq!(err.cause.name(), Some("AbortError"));
    }

    #[test]
    fn test_handler_error_becomes_evaluation_error() {
        let pair = Pair::new(RpcConfig::default());
        pair.child.register(
            "fail",
            Some(|_args: Args| Err(Cause::error("RangeError", "out of range"))),
        );

        let pending = pair.host.invoke(
            &pair.child.context(),
            None,
            "fail",
            (),
            InvocationOptions::new(),
        );
        pair.settle();

        let err = pending.result().unwrap().unwrap_err();
        assert_eq!(err.procedure_name, "fail");
        assert_eq!(err.cause.name(), Some("EvaluationError"));
        assert_eq!(err.cause.message(), "out of range");
        assert_eq!(err.cause.cause().and_then(Cause::name), Some("RangeError"));
    }
}
