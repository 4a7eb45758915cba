//! Vault fetching
//!
//! The fetcher retrieves raw vault bytes either with a direct GET or by
//! delegating to the page scanner over the cross-context channel. Network
//! access goes through the [`Transport`] trait so tests can swap in an
//! in-memory implementation.

mod http;

pub use http::HttpTransport;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::channel::{ChannelClient, ChannelError};
use crate::protocol::{ScanRequest, ScanResponse};
use crate::source::{SourceConfig, SourceKind};

/// Client side of the page scanner channel
pub type ScannerClient = ChannelClient<ScanRequest, ScanResponse>;

/// Errors that can occur while fetching
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("page scanner: {0}")]
    Scanner(String),

    #[error("no page scanner is attached")]
    NoScanner,

    #[error("page scanner channel: {0}")]
    Channel(#[from] ChannelError),
}

/// Response to a GET
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Network access used by the fetcher and the page scanner
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET and return the status and body, whatever the status
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError>;
}

/// GET `url` expecting HTTP 200, honoring an optional timeout
pub async fn get_ok(
    transport: &dyn Transport,
    url: &str,
    limit: Option<Duration>,
) -> Result<Vec<u8>, FetchError> {
    let reply = match limit {
        Some(limit) => tokio::time::timeout(limit, transport.get(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout: limit,
            })??,
        None => transport.get(url).await?,
    };

    if reply.status != 200 {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: reply.status,
        });
    }
    Ok(reply.body)
}

/// Raw vault bytes as fetched, before decryption
#[derive(Clone, PartialEq, Eq)]
pub struct RawVault(Vec<u8>);

impl RawVault {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawVault({} bytes)", self.0.len())
    }
}

/// Fetches the vault from the configured source
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    scanner: Option<ScannerClient>,
    timeout: Option<Duration>,
    legacy_hang: bool,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Self {
        Self {
            transport,
            scanner: None,
            timeout,
            legacy_hang: false,
        }
    }

    /// Attach the page scanner used for page-link sources
    pub fn with_scanner(mut self, scanner: ScannerClient) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Never resolve on failure instead of returning an error
    pub fn with_legacy_hang(mut self, legacy_hang: bool) -> Self {
        self.legacy_hang = legacy_hang;
        self
    }

    /// Fetch raw vault bytes from `config`
    pub async fn fetch(&self, config: &SourceConfig) -> Result<RawVault, FetchError> {
        tracing::debug!(source = %config, "fetching vault");

        let result = match config.kind() {
            SourceKind::Url => self.fetch_url(config.location()).await,
            SourceKind::PageLink => self.fetch_page_link(config.location()).await,
        };

        match result {
            Ok(bytes) => {
                tracing::info!(source = %config, bytes = bytes.len(), "vault fetched");
                Ok(RawVault::new(bytes))
            }
            Err(e) if self.legacy_hang => {
                tracing::warn!(source = %config, error = %e, "fetch failed, waiting forever");
                std::future::pending().await
            }
            Err(e) => {
                tracing::warn!(source = %config, error = %e, "fetch failed");
                Err(e)
            }
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        get_ok(self.transport.as_ref(), url, self.timeout).await
    }

    async fn fetch_page_link(&self, filename: &str) -> Result<Vec<u8>, FetchError> {
        let scanner = self.scanner.as_ref().ok_or(FetchError::NoScanner)?;
        match scanner.send(&ScanRequest::new(filename)).await? {
            ScanResponse::Vault { vault_data } => Ok(vault_data),
            ScanResponse::Failed { error } => Err(FetchError::Scanner(error)),
        }
    }
}
