//! Header vocabulary shared by the server and the client.

/// Logical codec name; takes precedence over `content-type` when both are
/// present on a request.
pub const SERIALIZER: &str = "serializer";

/// Transport encoding applied to event-stream payloads.
pub const SERIALIZER_BASE: &str = "serializer-base";

/// Marks a unary response body as an encoded failure description rather than
/// a success payload.
pub const CALLBACK_STATUS: &str = "callback-status";

/// The [`CALLBACK_STATUS`] value signalling a failure.
pub const CALLBACK_STATUS_EXCEPTION: &str = "exception";

/// Media type of a streaming response body.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// The transport encoding name carried in [`SERIALIZER_BASE`].
pub const BASE64: &str = "base64";
