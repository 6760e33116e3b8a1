//! Error types for imgsource.

use thiserror::Error;

/// Terminal failure of one download request.
///
/// Every variant maps to an HTTP-like status code and a user-safe message;
/// the internal detail strings never reach clients. No variant is retried
/// internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Transport failure, non-2xx upstream status, or a cache entry that
    /// could not be replayed.
    #[error("source is unreachable: {detail}")]
    Unreachable { detail: String },

    /// Container format unrecognized, or recognized but load support for
    /// that type is disabled.
    #[error("source image type not supported")]
    UnsupportedType,

    #[error("source image dimensions are too big")]
    DimensionsTooBig,

    #[error("source image resolution is too big")]
    ResolutionTooBig,

    /// The byte ceiling was exceeded mid-stream. Partial data must be
    /// discarded; this is never a truncation.
    #[error("source image file is too big")]
    FileTooBig,

    /// Decoder bug or corrupt-but-plausible input rather than a policy
    /// violation. Always logged.
    #[error("unexpected download failure: {detail}")]
    Unexpected { detail: String },
}

impl DownloadError {
    pub(crate) fn unreachable(detail: impl Into<String>) -> Self {
        DownloadError::Unreachable {
            detail: detail.into(),
        }
    }

    pub(crate) fn unexpected(detail: impl Into<String>) -> Self {
        DownloadError::Unexpected {
            detail: detail.into(),
        }
    }

    /// HTTP-like status code for the surrounding server to map onto its
    /// response.
    pub fn status_code(&self) -> u16 {
        match self {
            DownloadError::Unreachable { .. } => 404,
            DownloadError::Unexpected { .. } => 500,
            _ => 422,
        }
    }

    /// Safe to show to the end client, unlike `Display` which carries
    /// internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadError::Unreachable { .. } => "Source image is unreachable",
            DownloadError::Unexpected { .. } => "Internal error",
            _ => "Invalid source image",
        }
    }
}

/// Startup wiring failure. Surfaced once at process start, never per
/// request.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no transport registered for enabled object-store scheme {0:?}")]
    MissingTransport(String),

    #[error("failed to build the shared HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DownloadError::unreachable("dns").status_code(), 404);
        assert_eq!(DownloadError::UnsupportedType.status_code(), 422);
        assert_eq!(DownloadError::DimensionsTooBig.status_code(), 422);
        assert_eq!(DownloadError::ResolutionTooBig.status_code(), 422);
        assert_eq!(DownloadError::FileTooBig.status_code(), 422);
        assert_eq!(DownloadError::unexpected("bug").status_code(), 500);
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = DownloadError::unreachable("connection refused to 10.0.0.8:443");
        assert_eq!(err.user_message(), "Source image is unreachable");
        assert!(!err.user_message().contains("10.0.0.8"));
        assert!(err.to_string().contains("connection refused"));
    }
}
