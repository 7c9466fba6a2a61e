use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be encoded by the selected codec.
    #[error("`{name}` encode error: {message}")]
    Encode {
        /// The codec that failed.
        name: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Bytes from the wire could not be decoded by the selected codec.
    #[error("`{name}` decode error: {message}")]
    Decode {
        /// The codec that failed.
        name: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Neither a `serializer` nor a `content-type` header was provided.
    #[error("header `serializer` or `content-type` must be set")]
    MissingHeaders,

    /// The requested codec name is not registered.
    #[error("serializer `{0}` not found")]
    UnknownName(String),

    /// The requested content type has no registered codec.
    #[error("serializer for content type `{0}` not found")]
    UnknownContentType(String),
}
