//! Optimistic-concurrency read-modify-write.
//!
//! Applies a caller-supplied transformation to a remote object atomically
//! under contention, using only conditional HTTP semantics — no server-side
//! locks. Each attempt materializes the current content, runs the
//! transformation on the local file, and uploads with `If-Match` pinned to
//! the observed generation. A competing writer advancing the generation
//! first fails the precondition remotely; the loop re-reads and replays the
//! transformation, up to a bounded number of attempts.
//!
//! The transformation callback must be a pure function of the file's
//! current content: it can run once per attempt, so anything keyed on
//! invocation count or external side effects will misbehave under
//! contention.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Body;
use reqwest::header::{self, HeaderValue};
use reqwest::StatusCode;
use stowage_core::Status;

use crate::error::ClientError;
use crate::location::{parse_etag_generation, response_error, Location};

/// Retry schedule for read-modify-write: a hard attempt ceiling and a
/// linearly growing delay (`completed_attempts × base_delay`) between
/// attempts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total attempts before the conflict becomes permanent.
    pub max_attempts: u32,
    /// Delay unit between attempts.
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl BackoffPolicy {
    /// The default attempt budget with no delay between attempts.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    fn delay_for(&self, completed_attempts: u32) -> Duration {
        self.base_delay * completed_attempts
    }
}

/// A temporary file standing in for a not-yet-existing remote object.
///
/// The attempt owns the file until either the cache takes it over
/// ([`ScratchFile::transfer`]) or the guard drops, which removes it. Every
/// exit path — success, error, panic — runs one of the two.
struct ScratchFile {
    path: PathBuf,
    transferred: bool,
}

impl ScratchFile {
    fn create() -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("stowage-rmw-")
            .tempfile()?;
        let path = file.into_temp_path().keep().map_err(|e| e.error)?;
        Ok(Self {
            path,
            transferred: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the cache now owns the file; dropping the guard becomes
    /// a no-op.
    fn transfer(mut self) {
        self.transferred = true;
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.transferred {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(path = %self.path.display(), error = %e,
                        "failed to remove scratch file");
                }
            }
        }
    }
}

impl Location {
    /// Atomically transform this object's content through a local file.
    ///
    /// The callback receives the path of a file holding the object's
    /// current content (an empty scratch file when the object does not
    /// exist remotely) and edits it in place. On upload conflicts the
    /// callback is replayed against freshly read content.
    pub fn read_modify_write_local<F>(&self, cb: F) -> Result<Status, ClientError>
    where
        F: FnMut(&Path) -> Result<(), ClientError>,
    {
        self.read_modify_write_local_with(&BackoffPolicy::default(), cb)
    }

    /// [`Location::read_modify_write_local`] with an explicit retry
    /// schedule.
    pub fn read_modify_write_local_with<F>(
        &self,
        backoff: &BackoffPolicy,
        mut cb: F,
    ) -> Result<Status, ClientError>
    where
        F: FnMut(&Path) -> Result<(), ClientError>,
    {
        let parts = self.request_parts(&[], None)?;

        for attempt in 0..backoff.max_attempts {
            let mut scratch = None;
            let (local_path, base_generation) = match self.fetch_local(&[]) {
                Ok(path) => (path, self.cache.generation(&parts.url)),
                Err(ClientError::NotFound { .. }) => {
                    // Unconditional create: empty scratch content, no
                    // precondition on the upload.
                    let guard = ScratchFile::create()?;
                    let path = guard.path().to_path_buf();
                    scratch = Some(guard);
                    (path, None)
                }
                Err(e) => return Err(e),
            };

            cb(&local_path)?;

            let mut headers = parts.headers.clone();
            if let Some(generation) = &base_generation {
                headers.insert(
                    header::IF_MATCH,
                    HeaderValue::from_str(generation).map_err(|_| ClientError::Header {
                        name: "If-Match",
                    })?,
                );
            }

            let source = local_path.clone();
            let resp = self.transport.put(&parts.url, &headers, || {
                fs::File::open(&source).map(Body::from)
            })?;
            let status = resp.status();

            if status.is_success() {
                let new_generation = parse_etag_generation(&parts.url, resp.headers())?;
                self.cache
                    .promote(&parts.url, &new_generation, &local_path)?;
                if let Some(guard) = scratch.take() {
                    guard.transfer();
                }
                tracing::info!(path = %parts.path, generation = %new_generation,
                    "modified object");
                return Ok(Status::ok(status.as_u16()));
            }

            // A competing writer advanced the generation first. Re-read and
            // replay after a linearly growing pause.
            if status == StatusCode::NOT_MODIFIED || status == StatusCode::PRECONDITION_FAILED {
                tracing::debug!(path = %parts.path, attempt = attempt + 1,
                    "write precondition failed, replaying");
                drop(scratch);
                if attempt + 1 < backoff.max_attempts {
                    std::thread::sleep(backoff.delay_for(attempt));
                }
                continue;
            }

            return Err(response_error(&parts.url, resp));
        }

        Err(ClientError::Conflict {
            url: parts.url,
            attempts: backoff.max_attempts,
        })
    }

    /// Atomically transform this object's content as bytes.
    ///
    /// Convenience over [`Location::read_modify_write_local`]: reads the
    /// materialized file, passes its content to the callback, writes the
    /// returned bytes back, and reuses the same commit/retry machinery.
    pub fn read_modify_write<F>(&self, cb: F) -> Result<Status, ClientError>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>, ClientError>,
    {
        self.read_modify_write_with(&BackoffPolicy::default(), cb)
    }

    /// [`Location::read_modify_write`] with an explicit retry schedule.
    pub fn read_modify_write_with<F>(
        &self,
        backoff: &BackoffPolicy,
        mut cb: F,
    ) -> Result<Status, ClientError>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>, ClientError>,
    {
        self.read_modify_write_local_with(backoff, |path| {
            let data = fs::read(path)?;
            let updated = cb(&data)?;
            fs::write(path, updated)?;
            Ok(())
        })
    }
}
