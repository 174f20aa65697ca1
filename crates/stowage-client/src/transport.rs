//! Pooled blocking HTTP transport.
//!
//! One `reqwest` client shared by every `Location` a context hands out,
//! behind a bounded connection gate. When the gate is saturated, additional
//! callers BLOCK until a permit frees up — thread-pool workers see stalls
//! under load, never request failures. Transient transport errors are
//! retried internally with exponential backoff before the caller hears
//! about them; response status codes are the caller's responsibility.

use std::io;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::HeaderMap;

use crate::error::ClientError;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// A bounded-concurrency blocking HTTP transport.
#[derive(Debug)]
pub struct PooledTransport {
    client: Client,
    gate: ConnectionGate,
}

impl PooledTransport {
    /// Build a transport with the given request timeout and permit count.
    pub fn new(timeout: Duration, pool_size: usize) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            gate: ConnectionGate::new(pool_size.max(1)),
        })
    }

    /// Issue a GET. Blocks for a permit, then for the request.
    pub fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, &str)],
    ) -> Result<Response, ClientError> {
        let _permit = self.gate.acquire();
        retry_send(|| {
            let mut req = self.client.get(url).headers(headers.clone());
            if !query.is_empty() {
                req = req.query(query);
            }
            req.send().map_err(ClientError::from)
        })
    }

    /// Issue a PUT with a streamed body. Blocks for a permit, then for the
    /// request. `make_body` is invoked once per attempt so a retried request
    /// starts from a fresh body; a source that cannot be replayed fails the
    /// retry rather than sending a truncated stream.
    pub fn put<F>(
        &self,
        url: &str,
        headers: &HeaderMap,
        make_body: F,
    ) -> Result<Response, ClientError>
    where
        F: Fn() -> io::Result<Body>,
    {
        let _permit = self.gate.acquire();
        retry_send(|| {
            let body = make_body()?;
            self.client
                .put(url)
                .headers(headers.clone())
                .body(body)
                .send()
                .map_err(ClientError::from)
        })
    }
}

/// Send a request with exponential backoff retry on transport errors.
///
/// The closure is called up to `MAX_RETRIES + 1` times. Only
/// [`ClientError::Transport`] failures trigger a retry.
fn retry_send<F>(f: F) -> Result<Response, ClientError>
where
    F: Fn() -> Result<Response, ClientError>,
{
    // Retry attempts with backoff, then one final attempt without retry.
    for attempt in 0..MAX_RETRIES {
        match f() {
            Ok(resp) => return Ok(resp),
            Err(ClientError::Transport(e)) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "HTTP request failed, retrying in {delay:?}: {e}"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
    f()
}

/// Counting gate: `acquire` blocks while no permits remain.
#[derive(Debug)]
struct ConnectionGate {
    permits: Mutex<usize>,
    freed: Condvar,
}

impl ConnectionGate {
    fn new(size: usize) -> Self {
        Self {
            permits: Mutex::new(size),
            freed: Condvar::new(),
        }
    }

    fn acquire(&self) -> GatePermit<'_> {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.freed.wait(&mut permits);
        }
        *permits -= 1;
        GatePermit { gate: self }
    }
}

struct GatePermit<'a> {
    gate: &'a ConnectionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        *self.gate.permits.lock() += 1;
        self.gate.freed.notify_one();
    }
}
