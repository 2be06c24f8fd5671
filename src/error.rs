//! Error types for the tenant settings cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tenant settings cache
#[derive(Error, Debug)]
pub enum Error {
    /// Internal cache invariant violation
    ///
    /// Raised when the frequency-list structure and the key index disagree,
    /// for example detaching a node that has no owning frequency tier. This
    /// indicates a bug in the engine itself and is never recovered from.
    #[error("cache invariant violated: {0}")]
    CacheInvariant(String),

    /// Backing store failure during a read or write
    #[error("backing store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
