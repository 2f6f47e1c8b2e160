//! Error types for the intake domain.

use weir_core::MsgId;

/// The result type used throughout weir-intake.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in intake operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An intake payload is missing required fields or has ill-typed ones.
    ///
    /// Terminal for the message: the bridge worker routes it to the DLQ.
    #[error("malformed intake payload: {message}")]
    MalformedPayload {
        /// Description of the structural problem.
        message: String,
    },

    /// A message id was not found in the queue.
    #[error("message not found: {msg_id}")]
    MessageNotFound {
        /// The id that was not found.
        msg_id: MsgId,
    },

    /// The batch read from the intake queue failed.
    ///
    /// Fatal for the drain invocation; no acknowledgement occurs, so no
    /// message is lost.
    #[error("queue read failed: {message}")]
    QueueRead {
        /// Description of the read failure.
        message: String,
    },

    /// The ledger does not expose an RPC with the configured name.
    #[error("unknown ledger rpc: {name}")]
    UnknownRpc {
        /// The RPC name that was not recognized.
        name: String,
    },

    /// The ledger could not be reached or refused the call.
    #[error("ledger unavailable: {message}")]
    LedgerUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from weir-core.
    #[error("core error: {0}")]
    Core(#[from] weir_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new malformed-payload error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_display() {
        let err = Error::malformed("missing resource_id");
        assert!(err.to_string().contains("malformed intake payload"));
        assert!(err.to_string().contains("missing resource_id"));
    }

    #[test]
    fn queue_read_display() {
        let err = Error::QueueRead {
            message: "connection reset".into(),
        };
        assert!(err.to_string().contains("queue read failed"));
    }

    #[test]
    fn unknown_rpc_display() {
        let err = Error::UnknownRpc {
            name: "settle_invoice".into(),
        };
        assert!(err.to_string().contains("settle_invoice"));
    }
}
