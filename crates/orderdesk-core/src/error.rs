//! Error types and result aliases for orderdesk.
//!
//! These errors cover the pure, I/O-free parts of the system: parsing
//! identifiers, days and decimals, and loading configuration.

/// The result type used throughout orderdesk-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// An invalid calendar day was provided.
    #[error("invalid calendar day '{value}': expected YYYY-MM-DD")]
    InvalidDay {
        /// The rejected input.
        value: String,
    },

    /// A time zone name could not be resolved.
    #[error("invalid timezone '{name}': {message}")]
    InvalidTimezone {
        /// The rejected time zone name.
        name: String,
        /// Why the name was rejected.
        message: String,
    },

    /// A decimal value could not be parsed or computed.
    #[error("invalid decimal: {message}")]
    InvalidDecimal {
        /// Description of the failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl Error {
    /// Creates a new decimal error with the given message.
    #[must_use]
    pub fn decimal(message: impl Into<String>) -> Self {
        Self::InvalidDecimal {
            message: message.into(),
        }
    }

    /// Creates a new serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
