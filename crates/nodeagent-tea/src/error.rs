//! Error types for the downstream connector.
//!
//! Three layers of failure are kept apart: a remote call that fails
//! ([`RemoteError`]), a name registry that cannot answer
//! ([`RegistryError`]), and the connector's own summary of either
//! ([`TeaError`]) as seen by the gateway.

use thiserror::Error;

use crate::endpoint::TeaOperation;

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, TeaError>;

/// Failure of a single remote call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote side could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote side raised an error while handling the call.
    #[error("remote failure: {0}")]
    Remote(String),

    /// The remote side answered with something that is not RTML.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

/// Failure of a name registry operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing is bound under the name.
    ///
    /// This is the only variant that means "not found"; every other one
    /// means the registry itself is in trouble.
    #[error("name not bound: {0}")]
    NotBound(String),

    /// The registry could not be reached.
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// The registry refused the operation.
    #[error("registry failure: {0}")]
    Failed(String),
}

/// Failure of a downstream call as reported to the gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TeaError {
    /// The telescope agent could not be resolved or called.
    #[error("TEA unavailable for {operation}: {reason}")]
    Unavailable {
        /// Operation that was attempted.
        operation: TeaOperation,
        /// What went wrong.
        reason: String,
    },
}

impl TeaError {
    pub(crate) fn unavailable(operation: TeaOperation, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }
}
