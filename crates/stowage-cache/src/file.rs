//! # On-Disk Generation Cache
//!
//! Files live at `{root}/{sha256(url)}/{sha256(generation)}`. Digest-derived
//! names keep arbitrary URLs and opaque generation tokens filesystem-safe,
//! and the two-level layout lets expiry drop everything known about one URL
//! in a single directory removal.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use stowage_core::sha256_hex;

use crate::error::CacheError;
use crate::GenerationCache;

/// Copy size for streamed materialization. Bounds memory regardless of
/// object size.
const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
struct CacheEntry {
    generation: String,
    path: PathBuf,
}

/// A digest-addressed disk cache with an in-memory index.
///
/// The index lock is held only for map operations; file writes happen
/// outside it, so concurrent materializations of different URLs do not
/// serialize on each other.
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    index: Mutex<HashMap<String, CacheEntry>>,
}

impl FileCache {
    /// Create a cache rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            index: Mutex::new(HashMap::new()),
        })
    }

    fn url_dir(&self, url: &str) -> PathBuf {
        self.root.join(sha256_hex(url.as_bytes()))
    }

    fn slot(&self, url: &str, generation: &str) -> PathBuf {
        self.url_dir(url).join(sha256_hex(generation.as_bytes()))
    }

    /// Replace the index entry for `url`, deleting the displaced file when it
    /// is not the one being installed.
    fn install(&self, url: &str, generation: &str, path: PathBuf) {
        let displaced = {
            let mut index = self.index.lock();
            index.insert(
                url.to_string(),
                CacheEntry {
                    generation: generation.to_string(),
                    path: path.clone(),
                },
            )
        };
        if let Some(old) = displaced {
            if old.path != path {
                if let Err(e) = fs::remove_file(&old.path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::debug!(path = %old.path.display(), error = %e,
                            "failed to remove displaced cache file");
                    }
                }
            }
        }
    }
}

impl GenerationCache for FileCache {
    fn generation(&self, url: &str) -> Option<String> {
        self.index.lock().get(url).map(|e| e.generation.clone())
    }

    fn local_file(&self, url: &str, generation: &str) -> Result<PathBuf, CacheError> {
        let index = self.index.lock();
        match index.get(url) {
            Some(entry) if entry.generation == generation && entry.path.exists() => {
                Ok(entry.path.clone())
            }
            _ => Err(CacheError::MissingEntry {
                url: url.to_string(),
                generation: generation.to_string(),
            }),
        }
    }

    fn store_at_generation(
        &self,
        url: &str,
        generation: &str,
        reader: &mut dyn Read,
    ) -> Result<PathBuf, CacheError> {
        let slot = self.slot(url, generation);
        if let Some(dir) = slot.parent() {
            fs::create_dir_all(dir)?;
        }

        // Stream into a sibling temp file, then rename into the slot so a
        // concurrent reader never observes a half-written generation.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            tmp.write_all(&buf[..n])?;
        }
        tmp.flush()?;
        tmp.persist(&slot).map_err(|e| e.error)?;

        tracing::debug!(url = %url, generation = %generation, path = %slot.display(),
            "materialized cache entry");
        self.install(url, generation, slot.clone());
        Ok(slot)
    }

    fn promote(&self, url: &str, generation: &str, path: &Path) -> Result<PathBuf, CacheError> {
        let slot = self.slot(url, generation);
        if let Some(dir) = slot.parent() {
            fs::create_dir_all(dir)?;
        }

        if path != slot {
            // Rename when possible; fall back to copy for sources on another
            // filesystem (scratch files usually live under the system temp
            // directory).
            if fs::rename(path, &slot).is_err() {
                fs::copy(path, &slot)?;
                fs::remove_file(path)?;
            }
        }

        tracing::debug!(url = %url, generation = %generation, path = %slot.display(),
            "promoted cache entry");
        self.install(url, generation, slot.clone());
        Ok(slot)
    }

    fn expire(&self, url: &str) {
        self.index.lock().remove(url);
        let dir = self.url_dir(url);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %dir.display(), error = %e,
                    "failed to remove expired cache directory");
            }
        }
        tracing::debug!(url = %url, "expired cache entry");
    }
}
