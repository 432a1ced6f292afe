//! Error types for the node agent gateway.

use std::path::PathBuf;

use nodeagent_rtml::RtmlError;
use nodeagent_tea::TeaError;
use thiserror::Error;

/// Result type alias for pipeline stages.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Credential check failure.
///
/// Raised before any document is looked at and always returned to the
/// caller as a fault, never folded into a reject document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Username` header.
    #[error("failed to find username in headers")]
    MissingUsername,

    /// No `Password` header.
    #[error("failed to find password in headers for username: {0}")]
    MissingPassword(String),

    /// The user is not in the credential store.
    #[error("failed to find password for username: {0} in persistent store")]
    UnknownUser(String),

    /// The password does not match.
    #[error("incorrect password for user: {0}")]
    BadPassword(String),
}

/// Failure of a pipeline stage after authentication.
///
/// Every variant ends up as the error string of a reject document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The inbound document could not be parsed.
    #[error("failed to parse RTML document: {0}")]
    Parse(#[from] RtmlError),

    /// Forwarding to the TEA is switched off.
    #[error("isteaconnected = false, not sending rtml onwards")]
    NotForwarding,

    /// The document lacks a contact or project identity.
    #[error("{0}")]
    MalformedDocument(String),

    /// The authenticated user is not the document's contact.
    #[error("identity mismatch: {0}")]
    IdentityMismatch(String),

    /// The document is not a score request, request or abort.
    #[error("unknown document request type: {0}")]
    UnknownDocumentType(String),

    /// The TEA could not be reached.
    #[error(transparent)]
    Downstream(#[from] TeaError),

    /// A reply document could not be written out.
    #[error("failed to serialize RTML document: {0}")]
    Serialize(RtmlError),
}

/// Failure to hand an update over to the intelligent agent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The agent could not be reached.
    #[error("delivery transport failure: {0}")]
    Transport(String),

    /// The agent answered with an error status.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The document could not be written out.
    #[error("failed to serialize update: {0}")]
    Serialize(RtmlError),

    /// The target cannot be expressed as a URL.
    #[error("invalid delivery target: {0}")]
    InvalidTarget(String),
}

/// Failure of the asynchronous relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The document carries no usable return address.
    #[error("no destination: {0}")]
    NoDestination(String),

    /// The document version has no known addressing scheme.
    #[error("unknown rtml document version: {0}")]
    UnsupportedVersion(String),

    /// The identities could not be mapped back.
    #[error("failed to rewrite aliases for document {id}: {source}")]
    Rewrite {
        /// Agent-side id of the document.
        id: String,
        /// Underlying rewrite error.
        #[source]
        source: GatewayError,
    },

    /// The update could not be handed over.
    #[error("failed to send update to {target} for document {id}: {source}")]
    Delivery {
        /// Where delivery was attempted.
        target: String,
        /// Agent-side id of the document.
        id: String,
        /// Underlying delivery error.
        #[source]
        source: DeliveryError,
    },
}

/// Configuration load or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON config did not deserialize.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A property had an unparsable value.
    #[error("invalid value '{value}' for property {key}")]
    InvalidValue {
        /// Property key.
        key: String,
        /// Offending value.
        value: String,
    },

    /// The settings are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
