//! The download orchestrator.
//!
//! Per request: cache lookup, else fetch through the transport registry and
//! store the dumped response; then stream the body through the probe window
//! and byte ceiling into a pooled buffer, and package the validated image
//! with the cache-hint headers.

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{ResponseCache, dump_response, parse_response};
use crate::config::Config;
use crate::error::{DownloadError, SetupError};
use crate::image::ImageData;
use crate::limit::LimitedBody;
use crate::pool::BufferPool;
use crate::sniff::{self, ProbeWindow};
use crate::transport::{SourceResponse, TransportRegistry};

/// Everything one successful acquisition hands to the processing stage.
///
/// Scoped to one inbound request and immutable after construction. Dropping
/// it releases the image's pooled buffer.
#[derive(Debug)]
pub struct RequestContext {
    pub image: ImageData,
    /// `Cache-Control` header of the source response, empty when absent.
    pub cache_control: String,
    /// `Expires` header of the source response, empty when absent.
    pub expires: String,
}

/// The acquisition pipeline. One instance per process; every request runs
/// [`Downloader::download`] independently, sharing only the buffer pool and
/// the response cache.
pub struct Downloader {
    config: Config,
    registry: TransportRegistry,
    cache: ResponseCache,
    pool: BufferPool,
}

impl Downloader {
    pub fn new(config: Config, registry: TransportRegistry) -> Self {
        let cache = ResponseCache::new(config.cache_entries);
        let pool = BufferPool::new(config.concurrency, config.download_buffer_size);
        Self {
            config,
            registry,
            cache,
            pool,
        }
    }

    /// Registry from configuration alone: `http`/`https`, plus `local` when
    /// a filesystem root is configured.
    pub fn from_config(config: Config) -> Result<Self, SetupError> {
        let registry = TransportRegistry::builder().build(&config)?;
        Ok(Self::new(config, registry))
    }

    /// Acquire one source image.
    ///
    /// Terminal on every failure; nothing is retried here. The caller's
    /// request lifetime is the cancellation scope: dropping the returned
    /// future releases any pooled buffer already acquired.
    pub async fn download(&self, image_url: &str) -> Result<RequestContext, DownloadError> {
        let result = self.run(image_url).await;
        if let Err(err) = &result {
            self.report(image_url, err);
        }
        result
    }

    async fn run(&self, image_url: &str) -> Result<RequestContext, DownloadError> {
        let response = match self.cache.lookup(image_url) {
            Some(replayed) => replayed?,
            None => self.fetch_and_store(image_url).await?,
        };

        let cache_control = response.header("Cache-Control").unwrap_or_default().to_string();
        let expires = response.header("Expires").unwrap_or_default().to_string();
        let image = self.read_and_check(response).await?;

        Ok(RequestContext {
            image,
            cache_control,
            expires,
        })
    }

    /// Fetch a source on cache miss and store its wire dump.
    ///
    /// Only 2xx responses are cached, and they are cached before validation
    /// runs: a source that fails validation downstream stays cached, so
    /// repeat requests for a known-bad source never re-fetch.
    async fn fetch_and_store(&self, image_url: &str) -> Result<SourceResponse, DownloadError> {
        let url = Url::parse(image_url)
            .map_err(|err| DownloadError::unreachable(format!("invalid source URL: {err}")))?;

        let raw = timeout(self.config.download_timeout, self.fetch_and_dump(&url))
            .await
            .map_err(|_| DownloadError::unreachable("download timed out"))??;

        self.cache.store(image_url, raw.clone());

        // validate against the replay so every request sees exactly what
        // the cache will serve from now on
        parse_response(&raw)
            .map_err(|err| DownloadError::unexpected(format!("response dump failed to parse: {err}")))
    }

    async fn fetch_and_dump(&self, url: &Url) -> Result<Bytes, DownloadError> {
        let response = self
            .registry
            .fetch(url)
            .await
            .map_err(|err| DownloadError::unreachable(err.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(DownloadError::unreachable(format!(
                "unexpected status {}",
                response.status
            )));
        }

        let max_bytes = self.config.max_src_file_size;
        if let Some(len) = response.content_length
            && max_bytes > 0
            && len > max_bytes as u64
        {
            return Err(DownloadError::FileTooBig);
        }

        let SourceResponse {
            status,
            headers,
            content_length,
            body,
        } = response;

        let mut hint = content_length.unwrap_or(0) as usize;
        if max_bytes > 0 {
            hint = hint.min(max_bytes);
        }
        let mut raw_body = BytesMut::with_capacity(hint);
        let mut body = LimitedBody::new(body, max_bytes);
        while let Some(chunk) = body.next().await {
            raw_body.extend_from_slice(&chunk?);
        }

        Ok(dump_response(status, &headers, &raw_body))
    }

    /// Stream the body into a pooled buffer, validating the leading bytes
    /// before the rest is drained.
    async fn read_and_check(&self, response: SourceResponse) -> Result<ImageData, DownloadError> {
        let max_bytes = self.config.max_src_file_size;
        if let Some(len) = response.content_length
            && max_bytes > 0
            && len > max_bytes as u64
        {
            return Err(DownloadError::FileTooBig);
        }

        let hint = response.content_length.unwrap_or(0) as usize;
        let mut buf = self.pool.acquire(hint).await;
        let mut body = LimitedBody::new(response.body, max_bytes);
        let mut window = ProbeWindow::new(self.config.max_scan_bytes);

        // fan every leading chunk into both sinks: the probe window and
        // the pooled buffer
        let mut want_more = true;
        while want_more {
            match body.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    want_more = window.absorb(&chunk);
                    buf.extend_from_slice(&chunk);
                }
                None => break,
            }
        }

        let kind = sniff::check_type_and_dimensions(window.bytes(), &self.config)?;

        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }

        debug!(kind = %kind, bytes = buf.len(), "source validated");
        Ok(ImageData::new(buf, kind))
    }

    fn report(&self, image_url: &str, err: &DownloadError) {
        match err {
            DownloadError::Unexpected { detail } => {
                warn!(url = image_url, detail = %detail, "unexpected download failure");
            }
            DownloadError::Unreachable { detail } if self.config.report_download_errors => {
                warn!(url = image_url, detail = %detail, "source unreachable");
            }
            _ => {
                debug!(url = image_url, error = %err, "download rejected");
            }
        }
    }
}
