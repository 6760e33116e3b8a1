//! Scheme-dispatched fetch strategies behind one uniform contract.
//!
//! The registry is sealed at startup: `http`/`https` share one long-lived
//! client, the `local` scheme serves files under a configured root, and
//! object-store backends are registered under their scheme token. A scheme
//! that was never registered fails dispatch without any I/O.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::SetupError;

/// Response body as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// What every fetch strategy returns: a status, a header set, the content
/// length when known, and a readable body. Status interpretation (2xx or
/// not) belongs to the orchestrator, not the strategy.
pub struct SourceResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl SourceResponse {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for SourceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .field("body", &"<stream>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no transport registered for scheme {0:?}")]
    UnknownScheme(String),

    #[error("request rejected: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A fetch strategy for one URL scheme.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<SourceResponse, TransportError>;
}

/// Scheme-keyed transport dispatch, built once at startup.
pub struct TransportRegistry {
    schemes: HashMap<String, Arc<dyn Transport>>,
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("schemes", &self.schemes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransportRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Transport>> {
        self.schemes.get(scheme).cloned()
    }

    pub async fn fetch(&self, url: &Url) -> Result<SourceResponse, TransportError> {
        let Some(transport) = self.get(url.scheme()) else {
            return Err(TransportError::UnknownScheme(url.scheme().to_string()));
        };
        debug!(scheme = url.scheme(), "dispatching fetch");
        transport.fetch(url).await
    }
}

/// Collects object-store strategies before the registry is sealed.
///
/// `build` registers `http`/`https` and (when a root is configured) the
/// `local` scheme, then checks that every scheme named in
/// `config.object_stores` has a strategy. A missing one is a startup
/// error, so a misconfigured backend cannot surface at request time.
#[derive(Default)]
pub struct RegistryBuilder {
    object_stores: HashMap<String, Arc<dyn Transport>>,
}

impl RegistryBuilder {
    pub fn object_store(mut self, scheme: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.object_stores.insert(scheme.into(), transport);
        self
    }

    pub fn build(self, config: &Config) -> Result<TransportRegistry, SetupError> {
        let mut schemes: HashMap<String, Arc<dyn Transport>> = HashMap::new();

        let http: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(config).map_err(SetupError::HttpClient)?);
        schemes.insert("http".to_string(), Arc::clone(&http));
        schemes.insert("https".to_string(), http);

        if let Some(root) = &config.local_fs_root {
            schemes.insert("local".to_string(), Arc::new(FileTransport::new(root.clone())));
        }

        for scheme in &config.object_stores {
            if !self.object_stores.contains_key(scheme) {
                return Err(SetupError::MissingTransport(scheme.clone()));
            }
        }
        schemes.extend(self.object_stores);

        Ok(TransportRegistry { schemes })
    }
}

/// Network strategy for `http` and `https`.
///
/// One client for the process lifetime: idle connections capped at the
/// configured concurrency, transport-level decompression disabled (any
/// decompression belongs to a later stage), a long TCP keep-alive, the
/// configured `User-Agent`, and an optional certificate-verification
/// bypass. Proxy environment variables are honored.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.concurrency)
            .tcp_keepalive(Duration::from_secs(600))
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.ignore_ssl_verification)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<SourceResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_length = response.content_length();
        let body = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));

        Ok(SourceResponse {
            status,
            headers,
            content_length,
            body: Box::pin(body),
        })
    }
}

/// Strategy for the `local` scheme: serves files under a fixed root.
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch(&self, url: &Url) -> Result<SourceResponse, TransportError> {
        // the URL parser has already removed dot segments from the path
        let rel = url.path().trim_start_matches('/');
        if rel.is_empty() {
            return Err(TransportError::InvalidRequest(
                "local source path is empty".to_string(),
            ));
        }
        let path = self.root.join(rel);

        let file = tokio::fs::File::open(&path).await?;
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(TransportError::InvalidRequest(format!(
                "local source {rel:?} is a directory"
            )));
        }
        let len = meta.len();

        let body = stream::unfold(Some(file), |state| async move {
            let mut file = state?;
            let mut chunk = vec![0u8; 64 * 1024];
            match file.read(&mut chunk).await {
                Ok(0) => None,
                Ok(n) => {
                    chunk.truncate(n);
                    Some((Ok(Bytes::from(chunk)), Some(file)))
                }
                Err(err) => Some((Err(err), None)),
            }
        });

        Ok(SourceResponse {
            status: 200,
            headers: vec![("Content-Length".to_string(), len.to_string())],
            content_length: Some(len),
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut body: BodyStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = SourceResponse {
            status: 200,
            headers: vec![("Cache-Control".to_string(), "max-age=60".to_string())],
            content_length: None,
            body: Box::pin(stream::empty()),
        };
        assert_eq!(response.header("cache-control"), Some("max-age=60"));
        assert_eq!(response.header("CACHE-CONTROL"), Some("max-age=60"));
        assert_eq!(response.header("Expires"), None);
    }

    #[test]
    fn test_builder_requires_enabled_object_stores() {
        let config = Config {
            object_stores: vec!["s3".to_string()],
            ..Config::default()
        };
        let err = TransportRegistry::builder().build(&config).unwrap_err();
        assert!(matches!(err, SetupError::MissingTransport(scheme) if scheme == "s3"));
    }

    #[test]
    fn test_unregistered_scheme_is_not_dispatched() {
        let registry = TransportRegistry::builder()
            .build(&Config::default())
            .unwrap();
        assert!(registry.get("http").is_some());
        assert!(registry.get("https").is_some());
        assert!(registry.get("local").is_none());
        assert!(registry.get("s3").is_none());
    }

    #[test]
    fn test_local_scheme_requires_configured_root() {
        let config = Config {
            local_fs_root: Some(PathBuf::from("/srv/images")),
            ..Config::default()
        };
        let registry = TransportRegistry::builder().build(&config).unwrap();
        assert!(registry.get("local").is_some());
    }

    #[tokio::test]
    async fn test_file_transport_serves_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/img.bin"), b"file payload").unwrap();

        let transport = FileTransport::new(dir.path());
        let url = Url::parse("local:///sub/img.bin").unwrap();
        let response = transport.fetch(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(12));
        assert_eq!(collect(response.body).await, b"file payload");
    }

    #[tokio::test]
    async fn test_file_transport_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(dir.path());
        let url = Url::parse("local:///nope.png").unwrap();
        let err = transport.fetch(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_file_transport_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let transport = FileTransport::new(dir.path());
        let url = Url::parse("local:///sub").unwrap();
        let err = transport.fetch(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
