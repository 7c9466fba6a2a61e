//! Server side of wirecall: the procedure registry, the call dispatch
//! engine, the heartbeat-keeping event-stream encoder, and axum glue.
//!
//! Procedures are registered once at startup into a [`ProcedureRegistry`]
//! whose execution mode (blocking or suspending) is checked at registration
//! time. [`RpcServer`] negotiates a serializer for each request, binds the
//! decoded arguments against the procedure's declared signature, and renders
//! either a single encoded body or a live event-stream.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod dispatch;
mod encoder;
mod error;
mod registry;
mod router;

pub use dispatch::{CallOutcome, DEFAULT_HEARTBEAT, DEFAULT_STREAM_CAPACITY, RpcServer};
pub use error::{Error, Result};
pub use registry::{
    ExecutionMode, HandlerError, InvocationKind, Procedure, ProcedureRegistry, UnaryResult,
    ValueStream,
};
pub use router::router;

pub use wirecall_protocol::{Arguments, Params};
