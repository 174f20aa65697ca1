//! Shared wiremock harness for contract tests.
//!
//! The client under test is blocking, so the mock server cannot live on an
//! ambient `#[tokio::test]` runtime. The harness owns a multi-thread
//! runtime, starts the server through it, and keeps it alive for the
//! test's duration; requests are issued straight from the test thread.
//! Field order matters: the server must drop while the runtime still runs.

use std::sync::Arc;

use stowage_cache::FileCache;
use stowage_client::{AgentConfig, IssueRequest, Location, StowageClient};
use stowage_crypto::Ed25519Signer;
use wiremock::{Mock, MockServer};

pub struct Harness {
    pub server: MockServer,
    pub client: StowageClient,
    pub cache: Arc<FileCache>,
    _cache_dir: tempfile::TempDir,
    rt: tokio::runtime::Runtime,
}

impl Harness {
    pub fn start() -> Self {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let server = rt.block_on(MockServer::start());

        let cache_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(cache_dir.path().join("cache")).unwrap());

        let config = AgentConfig::new(server.uri().parse().unwrap(), "C1", "nonce-1");
        let client = StowageClient::new(
            config,
            Arc::new(Ed25519Signer::generate()),
            cache.clone(),
        )
        .unwrap();

        Self {
            server,
            client,
            cache,
            _cache_dir: cache_dir,
            rt,
        }
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    /// Clear mounted mocks and recorded expectations between test phases.
    pub fn reset(&self) {
        self.rt.block_on(self.server.reset());
    }

    /// A location confined to the given prefix with issuance defaults.
    pub fn location(&self, path_prefix: &str) -> Location {
        self.client.issue(IssueRequest::new(path_prefix)).unwrap()
    }

    /// The canonical URL the server sees for an absolute path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }
}
