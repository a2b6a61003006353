//! Frame RPC Scenario Utilities
//!
//! Shared fixtures for the cross-crate scenario tests in `tests/`.
//!
//! ## Test Philosophy
//!
//! - **Two frames, one bus**: Every scenario runs a host and a child frame
//!   over the simulated bus, exactly as two documents would talk
//! - **Virtual time only**: Timeouts are asserted at exact virtual instants
//! - **Deterministic faults**: Lost messages are scripted with a FaultPlan

use core_types::{Duration, Instant};
use frame_rpc::{Rpc, RpcConfig, RpcSetupError};
use serde::ser::{Error as _, Serialize, Serializer};
use serde_json::Value;
use sim_frames::{FaultPlan, SimWorld};

pub const HOST_ORIGIN: &str = "https://host.example";
pub const CHILD_ORIGIN: &str = "https://child.example";

/// Instance defaults used by the scenarios: no timeout, no retries
pub fn test_config() -> RpcConfig {
    RpcConfig::default()
        .with_default_timeout(0)
        .with_default_retry_limit(0)
}

/// A host frame and a child frame sharing one simulated world
pub struct FramePair {
    pub world: SimWorld,
    pub host: Rpc,
    pub child: Rpc,
}

impl FramePair {
    pub fn new() -> Result<Self, RpcSetupError> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcSetupError> {
        Self::build(SimWorld::new(), config)
    }

    pub fn with_fault_plan(plan: FaultPlan, config: RpcConfig) -> Result<Self, RpcSetupError> {
        Self::build(SimWorld::new().with_fault_plan(plan), config)
    }

    fn build(mut world: SimWorld, config: RpcConfig) -> Result<Self, RpcSetupError> {
        let host = world.spawn_rpc(HOST_ORIGIN, config)?;
        let child = world.spawn_rpc(CHILD_ORIGIN, config)?;
        Ok(Self { world, host, child })
    }

    /// Delivers everything that can happen without time passing
    pub fn settle(&self) -> usize {
        self.world.run_until_idle()
    }

    pub fn advance_ms(&self, millis: u64) -> usize {
        self.world.advance(Duration::from_millis(millis))
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.world.now().duration_since(Instant::ZERO).as_millis()
    }
}

/// A value that refuses to be cloned across the boundary, like a window
pub struct Unclonable;

impl Serialize for Unclonable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("Window object could not be cloned."))
    }
}

/// Sums every number in an arbitrarily nested sequence or mapping
pub fn recursive_sum(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::Array(items) => items.iter().map(recursive_sum).sum(),
        Value::Object(fields) => fields.values().map(recursive_sum).sum(),
        _ => 0,
    }
}
