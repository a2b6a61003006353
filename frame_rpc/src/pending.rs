//! Pending results
//!
//! A [`PendingInvocation`] is what `invoke()` hands back: a result that
//! settles exactly once, later, while the owning instance is polled. It can
//! be inspected, observed with a callback, or awaited as a [`Future`].
//!
//! A [`Deferred`] is the handler-side mirror: a handler that cannot answer
//! immediately returns one and settles it later through its [`Resolver`].
//!
//! Everything here is single-threaded (`Rc`), like the instance itself.

use crate::envelope::CallId;
use crate::error::{Cause, InvocationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

type Callback<T> = Box<dyn FnOnce(T)>;

struct Slot<T> {
    outcome: Option<T>,
    waker: Option<Waker>,
    callbacks: Vec<Callback<T>>,
}

/// Shared write-once cell
pub(crate) struct Settlement<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Settlement<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Clone + 'static> Settlement<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                outcome: None,
                waker: None,
                callbacks: Vec::new(),
            })),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.slot.borrow().outcome.is_some()
    }

    pub(crate) fn peek(&self) -> Option<T> {
        self.slot.borrow().outcome.clone()
    }

    /// Stores the outcome; returns false if it was already settled
    ///
    /// Callbacks and the waker run after the internal borrow is released,
    /// so they may freely inspect this settlement again.
    pub(crate) fn settle(&self, outcome: T) -> bool {
        let (callbacks, waker) = {
            let mut slot = self.slot.borrow_mut();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(outcome.clone());
            (std::mem::take(&mut slot.callbacks), slot.waker.take())
        };

        for callback in callbacks {
            callback(outcome.clone());
        }
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    pub(crate) fn on_settle(&self, callback: impl FnOnce(T) + 'static) {
        let settled = self.peek();
        match settled {
            Some(outcome) => callback(outcome),
            None => self.slot.borrow_mut().callbacks.push(Box::new(callback)),
        }
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.slot.borrow_mut();
        match &slot.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Result of one invocation
pub type InvocationResult = Result<Value, InvocationError>;

/// Handle to the eventual result of `invoke()`
#[derive(Clone)]
pub struct PendingInvocation {
    id: CallId,
    procedure_name: String,
    settlement: Settlement<InvocationResult>,
}

impl PendingInvocation {
    pub(crate) fn new(
        id: CallId,
        procedure_name: String,
        settlement: Settlement<InvocationResult>,
    ) -> Self {
        Self {
            id,
            procedure_name,
            settlement,
        }
    }

    /// An invocation that failed before anything was sent
    pub(crate) fn rejected(id: CallId, error: InvocationError) -> Self {
        let settlement = Settlement::new();
        let procedure_name = error.procedure_name.clone();
        settlement.settle(Err(error));
        Self::new(id, procedure_name, settlement)
    }

    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn procedure_name(&self) -> &str {
        &self.procedure_name
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    /// The settled result, or `None` while still pending
    pub fn result(&self) -> Option<InvocationResult> {
        self.settlement.peek()
    }

    /// The settled result, with a success value deserialized into `T`
    ///
    /// A value that does not fit `T` is reported as a `TypeError` cause.
    pub fn result_as<T: DeserializeOwned>(&self) -> Option<Result<T, InvocationError>> {
        let result = self.result()?;
        Some(result.and_then(|value| {
            serde_json::from_value(value).map_err(|err| {
                InvocationError::new(
                    self.procedure_name.clone(),
                    Cause::error("TypeError", err.to_string()),
                )
            })
        }))
    }

    /// Runs `callback` once settled (immediately if already settled)
    pub fn on_settle(&self, callback: impl FnOnce(InvocationResult) + 'static) {
        self.settlement.on_settle(callback);
    }
}

impl fmt::Debug for PendingInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInvocation")
            .field("id", &self.id)
            .field("procedure_name", &self.procedure_name)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Future for PendingInvocation {
    type Output = InvocationResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.settlement.poll_outcome(cx)
    }
}

/// How a deferred handler result ended
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeferredOutcome {
    Resolved(Value),
    /// Resolved with a value that cannot cross the boundary
    Unserializable(String),
    Rejected(Cause),
}

/// Asynchronous handler result
#[derive(Clone)]
pub struct Deferred {
    settlement: Settlement<DeferredOutcome>,
    /// Alive while any clone of the resolver is
    resolver: Weak<()>,
}

impl Deferred {
    /// Creates an unsettled result and the handle that settles it
    pub fn pair() -> (Deferred, Resolver) {
        let settlement = Settlement::new();
        let alive = Rc::new(());
        (
            Deferred {
                settlement: settlement.clone(),
                resolver: Rc::downgrade(&alive),
            },
            Resolver {
                settlement,
                _alive: alive,
            },
        )
    }

    /// An already-resolved result
    pub fn resolved<T: Serialize + ?Sized>(value: &T) -> Deferred {
        let (deferred, resolver) = Deferred::pair();
        resolver.resolve(value);
        deferred
    }

    /// An already-rejected result
    pub fn rejected(cause: impl Into<Cause>) -> Deferred {
        let (deferred, resolver) = Deferred::pair();
        resolver.reject(cause);
        deferred
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    /// Unsettled, and every resolver is gone
    pub fn is_abandoned(&self) -> bool {
        !self.is_settled() && self.resolver.strong_count() == 0
    }

    pub(crate) fn outcome(&self) -> Option<DeferredOutcome> {
        self.settlement.peek()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Settles a [`Deferred`]; only the first call has any effect
#[derive(Clone)]
pub struct Resolver {
    settlement: Settlement<DeferredOutcome>,
    _alive: Rc<()>,
}

impl Resolver {
    pub fn resolve<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        let outcome = match serde_json::to_value(value) {
            Ok(value) => DeferredOutcome::Resolved(value),
            Err(err) => DeferredOutcome::Unserializable(err.to_string()),
        };
        self.settlement.settle(outcome)
    }

    pub fn reject(&self, cause: impl Into<Cause>) -> bool {
        self.settlement.settle(DeferredOutcome::Rejected(cause.into()))
    }

    /// Settles with the result of another invocation
    ///
    /// A failed invocation rejects with its description, so the caller on
    /// the far side sees an `EvaluationError` wrapping an `InvocationError`.
    pub fn settle_with(&self, result: InvocationResult) -> bool {
        match result {
            Ok(value) => self.settlement.settle(DeferredOutcome::Resolved(value)),
            Err(err) => self.reject(Cause::from(err.describe())),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}
