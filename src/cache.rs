//! Serialized-response store over the adaptive-replacement core.
//!
//! A fresh 2xx response is dumped to an HTTP/1.1-style wire image (status
//! line, headers, blank line, raw body) and stored under the source URL;
//! a later lookup replays that image as if it had just been received. The
//! whole body is buffered once into the serialized form, an accepted cost
//! for replay fidelity and the first tuning target if memory gets tight.

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream;
use thiserror::Error;
use tracing::debug;

use crate::arc::AdaptiveCache;
use crate::error::DownloadError;
use crate::transport::SourceResponse;

pub struct ResponseCache {
    entries: AdaptiveCache,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: AdaptiveCache::new(capacity),
        }
    }

    /// Replay a stored response. `None` is a miss; a stored entry that no
    /// longer parses is a download failure, surfaced as unreachable.
    pub fn lookup(&self, key: &str) -> Option<Result<SourceResponse, DownloadError>> {
        let raw = self.entries.get(key)?;
        debug!(key, "replaying cached response");
        Some(parse_response(&raw).map_err(|err| {
            DownloadError::unreachable(format!("cached response replay failed: {err}"))
        }))
    }

    pub fn store(&self, key: &str, raw: Bytes) {
        debug!(key, bytes = raw.len(), "storing response");
        self.entries.put(key, raw);
    }
}

#[derive(Debug, Error)]
pub(crate) enum ReplayError {
    #[error("malformed status line")]
    StatusLine,
    #[error("malformed header")]
    Header,
    #[error("missing header terminator")]
    Truncated,
}

pub(crate) fn dump_response(status: u16, headers: &[(String, String)], body: &[u8]) -> Bytes {
    let head_len: usize = headers.iter().map(|(k, v)| k.len() + v.len() + 4).sum();
    let mut out = BytesMut::with_capacity(32 + head_len + body.len());

    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(status.to_string().as_bytes());
    out.put_slice(b" ");
    out.put_slice(reason(status).as_bytes());
    out.put_slice(b"\r\n");
    for (name, value) in headers {
        out.put_slice(name.as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);

    out.freeze()
}

pub(crate) fn parse_response(raw: &Bytes) -> Result<SourceResponse, ReplayError> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(ReplayError::Truncated)?;
    let head = std::str::from_utf8(&raw[..split]).map_err(|_| ReplayError::Header)?;
    let body = raw.slice(split + 4..);

    let mut lines = head.split("\r\n");
    let status_line = lines.next().ok_or(ReplayError::StatusLine)?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().ok_or(ReplayError::StatusLine)?;
    if !version.starts_with("HTTP/") {
        return Err(ReplayError::StatusLine);
    }
    let status: u16 = parts
        .next()
        .ok_or(ReplayError::StatusLine)?
        .parse()
        .map_err(|_| ReplayError::StatusLine)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(ReplayError::Header)?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let content_length = Some(body.len() as u64);
    let replayed = stream::once(async move { Ok::<_, std::io::Error>(body) });
    Ok(SourceResponse {
        status,
        headers,
        content_length,
        body: Box::pin(replayed),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}
