use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
///
/// [`Error::Remote`] is the only variant a caller should expect for logical
/// remote failures; everything else reports a local or transport-level
/// fault.
#[derive(Debug, Error)]
pub enum Error {
    /// The response could not be interpreted as a wirecall response.
    #[error("bad server response: {0}")]
    BadResponse(String),

    /// Local argument binding against a stub signature failed; no request
    /// was sent.
    #[error(transparent)]
    Bind(#[from] wirecall_protocol::BindError),

    /// Transport-level failure from the HTTP client.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Reading the event-stream body failed.
    #[error("reading event stream: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed event-stream payload or unserializable argument.
    #[error(transparent)]
    Protocol(#[from] wirecall_protocol::Error),

    /// The remote procedure reported a failure; carries the server's
    /// description verbatim.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// A decoded result did not match the requested type.
    #[error("unexpected result shape: {0}")]
    ResultType(serde_json::Error),

    /// Encoding the request or decoding the response body failed.
    #[error(transparent)]
    Serializer(#[from] wirecall_serializers::Error),

    /// The server rejected the call before invoking a handler.
    #[error("server rejected call with status {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        message: String,
    },
}
