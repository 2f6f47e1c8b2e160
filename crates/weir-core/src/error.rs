//! Kernel error types.

/// The result type used throughout weir-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by kernel-level validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An identifier failed to parse.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of the parse failure.
        message: String,
    },

    /// A caller-supplied value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
