//! # Core Types
//!
//! This crate defines the fundamental types shared by every frame_rpc crate.
//!
//! ## Philosophy
//!
//! - **Contexts are opaque**: A context is only ever named by its [`ContextId`].
//!   Nothing about a context can be reached except by posting messages to it.
//! - **Origins are stamped, not claimed**: The message channel attaches the
//!   sender's [`Origin`]; receivers filter with an [`OriginFilter`].
//! - **Time is explicit**: Deadlines are computed against a [`Clock`], which
//!   may be virtual (tests) or monotonic wall time.
//!
//! ## Key Types
//!
//! - [`ContextId`]: Unique identifier for an execution context (a frame)
//! - [`Origin`]: Security origin of a context
//! - [`OriginFilter`]: Which origins an inbound message may come from
//! - [`Instant`] / [`Duration`]: Opaque time points and spans
//! - [`Clock`]: Source of the current [`Instant`]

pub mod ids;
pub mod time;

pub use ids::{ContextId, Origin, OriginFilter};
pub use time::{Clock, Duration, Instant, SystemClock};
