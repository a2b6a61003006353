//! # Simulated Frames
//!
//! Deterministic stand-ins for the environment an RPC instance lives in:
//! contexts connected by an in-memory message bus, a virtual clock, and
//! fault injection on delivery.
//!
//! ## Purpose
//!
//! - Runs under `cargo test` with no real time passing
//! - Deterministic (controlled time, no real concurrency)
//! - Inspectable (delivery counters, listener counts, pending messages)
//!
//! ## Example
//!
//! ```
//! use frame_rpc::{Args, InvocationOptions, Reply, RpcConfig};
//! use serde_json::json;
//! use sim_frames::SimWorld;
//!
//! let mut world = SimWorld::new();
//! let host = world.spawn_rpc("https://host.example", RpcConfig::default()).unwrap();
//! let child = world.spawn_rpc("https://child.example", RpcConfig::default()).unwrap();
//! child.register("double", Some(|args: Args| {
//!     let n: i64 = args.arg(0)?;
//!     Ok(Reply::value(&(n * 2)))
//! }));
//!
//! let pending = host.invoke(&child.context(), None, "double", json!([21]), InvocationOptions::new());
//! world.run_until_idle();
//! assert_eq!(pending.result(), Some(Ok(json!(42))));
//! ```

pub mod channel;
pub mod clock;
pub mod fault_injection;
pub mod message_queue;
pub mod world;

pub use channel::{ChannelStats, SimChannel};
pub use clock::SimClock;
pub use fault_injection::{FaultInjector, FaultPlan, MessageFault};
pub use world::SimWorld;
