//! Byte-budgeted wrapper around a transport body stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use crate::error::DownloadError;
use crate::transport::BodyStream;

/// Enforces a hard ceiling on the total bytes a body may yield.
///
/// The budget counts bytes actually read; the chunk that overruns it turns
/// into a terminal [`DownloadError::FileTooBig`], regardless of whether the
/// underlying source still has data. Callers must discard any partial data
/// on that failure; the ceiling is never a truncation. Transport-level
/// read errors surface as [`DownloadError::Unreachable`].
pub struct LimitedBody {
    inner: BodyStream,
    remaining: Option<i64>,
    failed: bool,
}

impl LimitedBody {
    /// `max_bytes == 0` disables the ceiling.
    pub fn new(inner: BodyStream, max_bytes: usize) -> Self {
        let remaining = (max_bytes > 0).then_some(max_bytes as i64);
        Self {
            inner,
            remaining,
            failed: false,
        }
    }
}

impl Stream for LimitedBody {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(left) = this.remaining.as_mut() {
                    *left -= chunk.len() as i64;
                    if *left < 0 {
                        this.failed = true;
                        return Poll::Ready(Some(Err(DownloadError::FileTooBig)));
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.failed = true;
                Poll::Ready(Some(Err(DownloadError::unreachable(err.to_string()))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    fn body_of(chunks: Vec<&'static [u8]>) -> BodyStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<std::io::Result<Bytes>>>(),
        ))
    }

    async fn drain(mut body: LimitedBody) -> Result<Vec<u8>, DownloadError> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_under_ceiling_passes_through() {
        let body = LimitedBody::new(body_of(vec![b"hello", b" ", b"world"]), 11);
        assert_eq!(drain(body).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_overrun_is_terminal() {
        let body = LimitedBody::new(body_of(vec![b"hello", b" ", b"world"]), 8);
        let err = drain(body).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileTooBig));
    }

    #[tokio::test]
    async fn test_nothing_yielded_after_failure() {
        let mut body = LimitedBody::new(body_of(vec![b"four", b"more"]), 2);
        assert!(matches!(
            body.next().await,
            Some(Err(DownloadError::FileTooBig))
        ));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_disables_the_ceiling() {
        let body = LimitedBody::new(body_of(vec![b"unbounded content"]), 0);
        assert_eq!(drain(body).await.unwrap(), b"unbounded content");
    }

    #[tokio::test]
    async fn test_read_error_maps_to_unreachable() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ];
        let body = LimitedBody::new(Box::pin(stream::iter(chunks)), 0);
        let err = drain(body).await.unwrap_err();
        assert!(matches!(err, DownloadError::Unreachable { .. }));
    }
}
