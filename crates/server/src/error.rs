use thiserror::Error;

use crate::registry::ExecutionMode;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler's execution mode disagrees with its registry's declared
    /// mode. Raised at registration time, never at call time.
    #[error(
        "a {registry:?} registry can only register {registry:?} handlers; `{name}` is {handler:?}"
    )]
    ModeMismatch {
        /// The procedure being registered.
        name: String,
        /// The registry's declared mode.
        registry: ExecutionMode,
        /// The handler's mode.
        handler: ExecutionMode,
    },
}
