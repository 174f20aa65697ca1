//! # Cache Error Types

use thiserror::Error;

/// Errors from local cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No cached content exists for the URL at the requested generation.
    #[error("no cached content for {url} at generation {generation}")]
    MissingEntry {
        /// The canonical URL that was looked up.
        url: String,
        /// The generation the caller expected to find.
        generation: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
