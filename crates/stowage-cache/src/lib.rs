//! # stowage-cache — Local Generation Cache
//!
//! Maps a canonical URL to the most recent server-confirmed generation token
//! and a local file holding that generation's content. The cache is what
//! makes conditional downloads cheap: a materialization call that comes back
//! "not modified" returns the already-stored file without transferring bytes.
//!
//! ## Invariant
//!
//! An entry's generation always equals the most recent generation this
//! process observed as confirmed-committed (through a successful GET or PUT)
//! for that URL. Entries are never advanced speculatively: callers commit a
//! generation only after the server confirmed it, and a failed upload leaves
//! the entry untouched.

pub mod error;
pub mod file;

pub use error::CacheError;
pub use file::FileCache;

use std::io::Read;
use std::path::{Path, PathBuf};

/// The cache collaborator contract consumed by `Location`.
///
/// Implementations must be safe for concurrent callers: one cache instance
/// is shared by every `Location` a client context hands out.
pub trait GenerationCache: Send + Sync {
    /// The confirmed generation for a URL, if one is cached.
    fn generation(&self, url: &str) -> Option<String>;

    /// The local file holding the given generation's content.
    fn local_file(&self, url: &str, generation: &str) -> Result<PathBuf, CacheError>;

    /// Stream a new generation's content into the cache, replacing any prior
    /// entry for the URL. Returns the materialized file path.
    fn store_at_generation(
        &self,
        url: &str,
        generation: &str,
        reader: &mut dyn Read,
    ) -> Result<PathBuf, CacheError>;

    /// Take ownership of an existing local file as the new confirmed
    /// generation for a URL, replacing any prior entry. The file is moved
    /// into cache storage; the source path is no longer valid afterwards.
    fn promote(&self, url: &str, generation: &str, path: &Path) -> Result<PathBuf, CacheError>;

    /// Drop the entry for a URL, removing its local content.
    fn expire(&self, url: &str);
}
