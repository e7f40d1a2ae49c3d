//! Resolving resource identifiers to byte streams.

use crate::error::LoadError;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

/// Opens a readable byte stream for a resource identifier.
///
/// Injected into the engine; the engine never interprets identifiers
/// itself beyond passing them here and to the caches.
pub trait Downloader: Send + Sync {
    fn open_stream(&self, resource: &str) -> Result<Box<dyn Read + Send>, LoadError>;
}

/// Downloader handling `http`/`https` via ureq and `file` URIs or bare
/// paths via the filesystem.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader with the given connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();
        Self { agent }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30))
    }
}

impl Downloader for HttpDownloader {
    fn open_stream(&self, resource: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        if let Some(path) = resource.strip_prefix("file://") {
            let file = File::open(path)?;
            return Ok(Box::new(file));
        }
        if resource.starts_with("http://") || resource.starts_with("https://") {
            let response = self
                .agent
                .get(resource)
                .call()
                .map_err(|e| LoadError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            return Ok(Box::new(response.into_reader()));
        }
        // Bare path
        let file = File::open(resource)?;
        Ok(Box::new(file))
    }
}
