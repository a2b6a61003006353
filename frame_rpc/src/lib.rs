//! # Frame RPC
//!
//! Remote procedure calls between isolated contexts that share nothing but
//! a message channel.
//!
//! ## Philosophy
//!
//! - **Calls look local**: `invoke()` hands back a result that settles like
//!   any other, and every failure arrives as one [`InvocationError`]
//! - **Errors are descriptions**: Failures cross the boundary as
//!   `{name, message, cause?}` and are rebuilt as a tagged [`RpcError`]
//! - **Explicit correlation**: Each call is a record in a keyed table;
//!   retries reuse its id and the first outcome wins
//! - **Deterministic driving**: Work only happens in [`Rpc::poll`], against
//!   an injected [`Clock`](core_types::Clock)
//!
//! ## Example
//!
//! ```ignore
//! child.register("add", Some(|args: Args| {
//!     let values: Vec<i64> = args.arg(0)?;
//!     Ok(Reply::value(&values.iter().sum::<i64>()))
//! }));
//!
//! let pending = host.invoke(&child.context(), None, "add", json!([[1, 2, 3]]), InvocationOptions::new());
//! // ... poll both instances ...
//! assert_eq!(pending.result(), Some(Ok(json!(6))));
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod pending;
pub mod registry;
mod responder;
mod rpc;
mod tracker;
mod transport;

#[cfg(test)]
mod test_utils;

pub use config::{DefaultInvocationOptions, InvocationOptions, RpcConfig};
pub use envelope::{CallId, Envelope, PROTOCOL, RPC_SCHEMA};
pub use error::{Cause, ErrorDescription, InvocationError, RpcError, RpcSetupError};
pub use pending::{Deferred, InvocationResult, PendingInvocation, Resolver};
pub use registry::{Args, Handler, HandlerResult, ProcedureRegistry, Reply};
pub use rpc::{Rpc, CLOSE_PROCEDURE};
