//! Wire-level vocabulary shared by the wirecall server and client: header
//! names, event-stream framing, the incremental event parser, and the call
//! envelope used for argument binding.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod envelope;
mod error;
mod event;
pub mod headers;
mod lines;
mod parser;

pub use envelope::{Arguments, BindError, Params};
pub use error::{Error, Result};
pub use event::{
    DATA_FIELD, EVENT_EXCEPTION, EVENT_FIELD, EVENT_YIELD, Event, decode_payload, encode_payload,
    ping_frame,
};
pub use lines::LineSplitter;
pub use parser::EventParser;
