//! Locations: immutable handles on remote objects.
//!
//! A `Location` pairs a server base URL and a capability grant (path prefix,
//! template, serialized policy, signature) with the shared transport and
//! cache it operates through. Instances are read-only value objects — a
//! canonical sub-location is derived by substituting template parameters,
//! never by mutating the original — and are safe to use concurrently from
//! multiple threads.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Body, Response};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use stowage_cache::GenerationCache;
use stowage_core::Status;
use url::Url;

use crate::config::AgentIdentity;
use crate::error::ClientError;
use crate::transport::PooledTransport;

/// Header carrying the base64-encoded serialized policy.
const POLICY_HEADER: &str = "x-rekall-policy";

/// Header carrying the base64-encoded policy signature.
const SIGNATURE_HEADER: &str = "x-rekall-signature";

/// HTTP-date layout for `If-Modified-Since`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A stat record for one remote object, as returned by the list action.
///
/// Servers evolve; everything past the path is defaulted so an unknown or
/// missing field never breaks a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStat {
    /// Path of the object below the server root.
    pub path: String,
    /// Object size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Current generation token, if the server reports one.
    #[serde(default)]
    pub generation: Option<String>,
    /// Creation time as epoch seconds.
    #[serde(default)]
    pub created: Option<i64>,
    /// Last-modified time as epoch seconds.
    #[serde(default)]
    pub modified: Option<i64>,
}

/// The resolved pieces of one HTTP request: canonical URL, normalized path,
/// and capability headers. Pure function of the location and its inputs.
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// Fully resolved absolute URL.
    pub url: String,
    /// Normalized path below the server root.
    pub path: String,
    /// Capability and cache-control headers.
    pub headers: HeaderMap,
}

/// An immutable handle on a remote resource.
#[derive(Clone)]
pub struct Location {
    pub(crate) base: Url,
    pub(crate) path_prefix: String,
    pub(crate) path_template: String,
    pub(crate) policy: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) identity: AgentIdentity,
    pub(crate) transport: Arc<PooledTransport>,
    pub(crate) cache: Arc<dyn GenerationCache>,
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Location")
            .field("base", &self.base.as_str())
            .field("path_prefix", &self.path_prefix)
            .field("path_template", &self.path_template)
            .field("policy_len", &self.policy.len())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

impl Location {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        base: Url,
        path_prefix: String,
        path_template: String,
        policy: Vec<u8>,
        signature: Vec<u8>,
        identity: AgentIdentity,
        transport: Arc<PooledTransport>,
        cache: Arc<dyn GenerationCache>,
    ) -> Self {
        Self {
            base,
            path_prefix,
            path_template,
            policy,
            signature,
            identity,
            transport,
            cache,
        }
    }

    /// The path prefix this location is confined to.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// The serialized policy blob sent with every request.
    pub fn policy(&self) -> &[u8] {
        &self.policy
    }

    /// The signature over the policy blob.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Expand the path template with the given parameters merged under this
    /// agent's identity fields.
    pub fn expand_path(&self, params: &[(&str, &str)]) -> Result<String, ClientError> {
        let mut vars: HashMap<&str, &str> = params.iter().copied().collect();
        vars.insert("client_id", &self.identity.client_id);
        vars.insert("nonce", &self.identity.nonce);
        expand_template(&self.path_template, &vars)
    }

    /// The normalized full path: prefix joined with the expanded template.
    pub fn to_path(&self, params: &[(&str, &str)]) -> Result<String, ClientError> {
        let subpath = self.expand_path(params)?;
        Ok(join_path(&[&self.path_prefix, &subpath]))
    }

    /// Derive an immutable sub-location whose prefix is this location's
    /// fully expanded path.
    pub fn canonical_sub_location(&self, params: &[(&str, &str)]) -> Result<Location, ClientError> {
        Ok(Location {
            base: self.base.clone(),
            path_prefix: self.to_path(params)?,
            path_template: "/".to_string(),
            policy: self.policy.clone(),
            signature: self.signature.clone(),
            identity: self.identity.clone(),
            transport: Arc::clone(&self.transport),
            cache: Arc::clone(&self.cache),
        })
    }

    /// Resolve the canonical URL and capability headers for one request.
    ///
    /// Deterministic given its inputs; issuing the request is the caller's
    /// business.
    pub fn request_parts(
        &self,
        params: &[(&str, &str)],
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<RequestParts, ClientError> {
        let path = self.to_path(params)?;
        let url = join_url(&self.base, &path);

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private"));
        headers.insert(
            HeaderName::from_static(POLICY_HEADER),
            HeaderValue::from_str(&BASE64.encode(&self.policy))
                .map_err(|_| ClientError::Header {
                    name: POLICY_HEADER,
                })?,
        );
        headers.insert(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&BASE64.encode(&self.signature)).map_err(|_| {
                ClientError::Header {
                    name: SIGNATURE_HEADER,
                }
            })?,
        );
        if let Some(since) = if_modified_since {
            headers.insert(
                header::IF_MODIFIED_SINCE,
                HeaderValue::from_str(&since.format(HTTP_DATE_FORMAT).to_string()).map_err(
                    |_| ClientError::Header {
                        name: "If-Modified-Since",
                    },
                )?,
            );
        }

        Ok(RequestParts { url, path, headers })
    }

    /// Read the object's content.
    ///
    /// Returns an empty buffer if the fetch fails for any reason; the
    /// failure is logged at debug level. Callers that need the distinction
    /// use [`Location::fetch_local`].
    pub fn read_file(&self, params: &[(&str, &str)]) -> Vec<u8> {
        match self.try_read(params) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "read failed, returning empty buffer");
                Vec::new()
            }
        }
    }

    fn try_read(&self, params: &[(&str, &str)]) -> Result<Vec<u8>, ClientError> {
        let parts = self.request_parts(params, None)?;
        let resp = self.transport.get(&parts.url, &parts.headers, &[])?;
        if !resp.status().is_success() {
            return Err(response_error(&parts.url, resp));
        }
        Ok(resp.bytes()?.to_vec())
    }

    /// Write the given bytes to the object.
    pub fn write_file(
        &self,
        data: &[u8],
        params: &[(&str, &str)],
    ) -> Result<Status, ClientError> {
        let parts = self.request_parts(params, None)?;
        let body = data.to_vec();
        let resp = self
            .transport
            .put(&parts.url, &parts.headers, || Ok(Body::from(body.clone())))?;
        tracing::debug!(path = %parts.path, bytes = body.len(), "uploaded object");
        finish_write(&parts.url, resp)
    }

    /// Stream a reader's content to the object.
    pub fn upload_file<R>(
        &self,
        reader: R,
        params: &[(&str, &str)],
    ) -> Result<Status, ClientError>
    where
        R: io::Read + Send + 'static,
    {
        let parts = self.request_parts(params, None)?;
        let slot = parking_lot::Mutex::new(Some(reader));
        let resp = self.transport.put(&parts.url, &parts.headers, || {
            slot.lock().take().map(Body::new).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "request body cannot be replayed",
                )
            })
        })?;
        tracing::debug!(path = %parts.path, "uploaded object stream");
        finish_write(&parts.url, resp)
    }

    /// Upload a local file's content, optionally removing the file after a
    /// successful upload.
    pub fn upload_local_file(
        &self,
        local_path: &Path,
        params: &[(&str, &str)],
        delete_after: bool,
    ) -> Result<Status, ClientError> {
        let parts = self.request_parts(params, None)?;
        let source = local_path.to_path_buf();
        let resp = self
            .transport
            .put(&parts.url, &parts.headers, || {
                fs::File::open(&source).map(Body::from)
            })?;
        tracing::debug!(path = %parts.path, file = %local_path.display(), "uploaded local file");
        let status = finish_write(&parts.url, resp)?;
        if delete_after {
            fs::remove_file(local_path)?;
        }
        Ok(status)
    }

    /// List the objects below this location's path.
    ///
    /// Ordering follows the server's response.
    pub fn list_files(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Vec<LocationStat>, ClientError> {
        let parts = self.request_parts(params, None)?;
        let resp = self
            .transport
            .get(&parts.url, &parts.headers, &[("action", "list")])?;
        if !resp.status().is_success() {
            return Err(response_error(&parts.url, resp));
        }
        resp.json().map_err(|e| ClientError::Deserialization {
            url: parts.url,
            source: e,
        })
    }

    /// Delete the object.
    pub fn delete(&self, params: &[(&str, &str)]) -> Result<Status, ClientError> {
        let parts = self.request_parts(params, None)?;
        let resp = self
            .transport
            .get(&parts.url, &parts.headers, &[("action", "delete")])?;
        finish_write(&parts.url, resp)
    }

    /// Materialize the object into the local cache, downloading only when
    /// the cached generation is stale.
    ///
    /// Returns the local file holding the current generation's content. A
    /// not-found response expires the cache entry before surfacing
    /// [`ClientError::NotFound`].
    pub fn fetch_local(&self, params: &[(&str, &str)]) -> Result<PathBuf, ClientError> {
        let parts = self.request_parts(params, None)?;
        let cached_generation = self.cache.generation(&parts.url);

        let mut headers = parts.headers.clone();
        if let Some(generation) = &cached_generation {
            headers.insert(
                header::IF_NONE_MATCH,
                HeaderValue::from_str(generation).map_err(|_| ClientError::Header {
                    name: "If-None-Match",
                })?,
            );
        }

        let resp = self.transport.get(&parts.url, &headers, &[])?;
        let status = resp.status();

        // Object not modified: hand back the cached copy, no transfer.
        if status == StatusCode::NOT_MODIFIED {
            let generation = cached_generation.ok_or(ClientError::MissingGeneration {
                url: parts.url.clone(),
            })?;
            return Ok(self.cache.local_file(&parts.url, &generation)?);
        }

        // Removed on the server: the local copy must expire with it.
        if status == StatusCode::NOT_FOUND {
            self.cache.expire(&parts.url);
            return Err(ClientError::NotFound { url: parts.url });
        }

        if !status.is_success() {
            return Err(response_error(&parts.url, resp));
        }

        let generation = parse_etag_generation(&parts.url, resp.headers())?;
        let mut body = resp;
        let path = self
            .cache
            .store_at_generation(&parts.url, &generation, &mut body)?;
        Ok(path)
    }
}

/// Map a non-success response into the error taxonomy. Consumes the
/// response to capture its body text.
pub(crate) fn response_error(url: &str, resp: Response) -> ClientError {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return ClientError::NotFound {
            url: url.to_string(),
        };
    }
    let body = resp.text().unwrap_or_default();
    ClientError::Server {
        status: status.as_u16(),
        body,
    }
}

/// Success → `Status` without body text; failure → taxonomy error.
pub(crate) fn finish_write(url: &str, resp: Response) -> Result<Status, ClientError> {
    let status = resp.status();
    if status.is_success() {
        Ok(Status::ok(status.as_u16()))
    } else {
        Err(response_error(url, resp))
    }
}

/// Extract the generation token from a JSON-quoted `ETag` header.
pub(crate) fn parse_etag_generation(
    url: &str,
    headers: &HeaderMap,
) -> Result<String, ClientError> {
    let raw = headers
        .get(header::ETAG)
        .ok_or_else(|| ClientError::MissingGeneration {
            url: url.to_string(),
        })?;
    let text = raw.to_str().map_err(|_| ClientError::MissingGeneration {
        url: url.to_string(),
    })?;
    serde_json::from_str::<String>(text).map_err(|_| ClientError::MissingGeneration {
        url: url.to_string(),
    })
}

/// Substitute `{name}` references from the variable map.
fn expand_template(
    template: &str,
    vars: &HashMap<&str, &str>,
) -> Result<String, ClientError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for k in chars.by_ref() {
            if k == '}' {
                closed = true;
                break;
            }
            key.push(k);
        }
        if !closed {
            return Err(ClientError::Template {
                key,
                template: template.to_string(),
            });
        }
        match vars.get(key.as_str()) {
            Some(value) => out.push_str(value),
            None => {
                return Err(ClientError::Template {
                    key,
                    template: template.to_string(),
                })
            }
        }
    }
    Ok(out)
}

/// Join path fragments with single separators, anchored at the root.
fn join_path(parts: &[&str]) -> String {
    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Join a base URL with an absolute path, normalizing the seam.
fn join_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
