use thiserror::Error;

use crate::envelope::BindError;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument value could not be converted into a wire value.
    #[error("argument `{name}` is not serializable: {source}")]
    Argument {
        /// The offending parameter name.
        name: String,
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// An event payload was not valid base64.
    #[error("invalid transport encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Argument binding failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}
