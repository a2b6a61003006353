//! Deterministic fault injection for testing
//!
//! Faults are applied when a message is posted, before it reaches any
//! listener. A dropped message is lost silently, exactly like a message
//! posted to a frame that never reads it.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: No randomness; the same plan drops the same messages
//! - **Composable**: A plan holds any number of faults
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_frames::fault_injection::{FaultPlan, MessageFault};
//!
//! let plan = FaultPlan::new()
//!     .with_message_fault(MessageFault::DropNext { count: 1 })
//!     .with_message_fault(MessageFault::DropMatching { procedure: "close".to_string() });
//! assert_eq!(plan.message_faults().len(), 2);
//! ```

use core_types::ContextId;
use serde_json::Value;
use std::collections::HashMap;

/// A fault to inject into message delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFault {
    /// Drop the next N messages posted to any context
    DropNext { count: usize },

    /// Drop the next N messages posted to one context
    DropNextTo { context: ContextId, count: usize },

    /// Drop every call to the named procedure
    DropMatching { procedure: String },
}

/// A plan describing all faults to inject
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    message_faults: Vec<MessageFault>,
}

impl FaultPlan {
    /// Creates a new empty fault plan
    pub fn new() -> Self {
        Self {
            message_faults: Vec::new(),
        }
    }

    /// Adds a message fault to the plan
    pub fn with_message_fault(mut self, fault: MessageFault) -> Self {
        self.message_faults.push(fault);
        self
    }

    pub fn message_faults(&self) -> &[MessageFault] {
        &self.message_faults
    }
}

/// Applies a [`FaultPlan`] to posted messages
#[derive(Debug)]
pub struct FaultInjector {
    plan: FaultPlan,
    drop_next_count: usize,
    drop_next_to: HashMap<ContextId, usize>,
    dropped: usize,
}

impl FaultInjector {
    pub fn new(plan: FaultPlan) -> Self {
        let mut injector = Self {
            plan: plan.clone(),
            drop_next_count: 0,
            drop_next_to: HashMap::new(),
            dropped: 0,
        };

        for fault in plan.message_faults() {
            match fault {
                MessageFault::DropNext { count } => {
                    injector.drop_next_count += *count;
                }
                MessageFault::DropNextTo { context, count } => {
                    *injector.drop_next_to.entry(*context).or_default() += *count;
                }
                MessageFault::DropMatching { .. } => {
                    // Handled per-message
                }
            }
        }

        injector
    }

    /// Checks if a message posted to `target` should be dropped
    pub fn should_drop(&mut self, target: &ContextId, data: &Value) -> bool {
        let drop = self.consume_drop(target) || self.matches_procedure(data);
        if drop {
            self.dropped += 1;
        }
        drop
    }

    /// Number of messages dropped so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn consume_drop(&mut self, target: &ContextId) -> bool {
        if self.drop_next_count > 0 {
            self.drop_next_count -= 1;
            return true;
        }

        match self.drop_next_to.get_mut(target) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn matches_procedure(&self, data: &Value) -> bool {
        let Some(procedure) = data.get("procedureName").and_then(Value::as_str) else {
            return false;
        };
        self.plan.message_faults().iter().any(|fault| {
            matches!(fault, MessageFault::DropMatching { procedure: name } if name == procedure)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(procedure: &str) -> Value {
        json!({"protocol": "frame-rpc", "kind": "call", "procedureName": procedure})
    }

    #[test]
    fn test_fault_plan_creation() {
        let plan = FaultPlan::new();
        assert!(plan.message_faults().is_empty());
    }

    #[test]
    fn test_drop_next() {
        let plan = FaultPlan::new().with_message_fault(MessageFault::DropNext { count: 2 });
        let mut injector = FaultInjector::new(plan);
        let target = ContextId::new();

        assert!(injector.should_drop(&target, &call("add")));
        assert!(injector.should_drop(&target, &call("add")));
        assert!(!injector.should_drop(&target, &call("add")));
        assert_eq!(injector.dropped(), 2);
    }

    #[test]
    fn test_drop_next_to_context() {
        let first = ContextId::new();
        let second = ContextId::new();
        let plan = FaultPlan::new().with_message_fault(MessageFault::DropNextTo {
            context: first,
            count: 1,
        });
        let mut injector = FaultInjector::new(plan);

        assert!(!injector.should_drop(&second, &call("add")));
        assert!(injector.should_drop(&first, &call("add")));
        assert!(!injector.should_drop(&first, &call("add")));
    }

    #[test]
    fn test_drop_matching_procedure() {
        let plan = FaultPlan::new().with_message_fault(MessageFault::DropMatching {
            procedure: "close".to_string(),
        });
        let mut injector = FaultInjector::new(plan);
        let target = ContextId::new();

        assert!(injector.should_drop(&target, &call("close")));
        assert!(injector.should_drop(&target, &call("close")));
        assert!(!injector.should_drop(&target, &call("add")));
        assert!(!injector.should_drop(&target, &json!("not an envelope")));
    }
}
