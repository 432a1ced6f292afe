//! Error types for RTML parsing and serialization.

use thiserror::Error;

/// Result type alias for document model operations.
pub type Result<T> = std::result::Result<T, RtmlError>;

/// Errors raised by the RTML document model.
///
/// Parse errors never carry the offending document; callers that need it
/// for error reporting keep the raw input themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtmlError {
    /// Input was empty or whitespace only.
    #[error("empty RTML document")]
    Empty,

    /// Input exceeded the maximum accepted document size.
    #[error("document too large: {size} bytes exceeds maximum of {max}")]
    TooLarge {
        /// Size of the rejected input in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        max: usize,
    },

    /// The XML reader rejected the input.
    #[error("XML syntax error: {0}")]
    Syntax(String),

    /// End of input was reached with an element still open.
    #[error("unclosed element <{0}> at end of input")]
    Unclosed(String),

    /// Non-whitespace text appeared outside the root element.
    #[error("text outside of the root element")]
    StrayText,

    /// More than one top-level element was found.
    #[error("multiple root elements")]
    MultipleRoots,

    /// The input held no element at all.
    #[error("no root element found")]
    NoRoot,

    /// The root element is not `<RTML>`.
    #[error("root element is <{0}>, expected <RTML>")]
    NotRtml(String),

    /// An element in the tree has no name and cannot be written.
    #[error("cannot serialize an element with an empty name")]
    EmptyElementName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_display() {
        let err = RtmlError::TooLarge { size: 20, max: 10 };
        assert_eq!(
            err.to_string(),
            "document too large: 20 bytes exceeds maximum of 10"
        );
    }

    #[test]
    fn test_not_rtml_display() {
        let err = RtmlError::NotRtml("html".to_string());
        assert!(err.to_string().contains("<html>"));
    }
}
