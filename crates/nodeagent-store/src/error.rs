//! Error types for store loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while loading a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store file could not be read.
    #[error("failed to read store file {}: {source}", path.display())]
    Io {
        /// Path of the file that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
