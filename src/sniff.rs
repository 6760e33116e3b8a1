//! Format and dimension validation from a stream prefix.
//!
//! The probe never sees more than the configured scan window, so an
//! unsupported or oversized source is rejected while the bulk of its body
//! is still unread.

use imagesize::ImageError;

use crate::config::Config;
use crate::error::DownloadError;
use crate::image::ImageType;

/// Collects the leading bytes of a body as one sink of the fan-out: every
/// chunk is offered here before it lands in the pooled buffer.
pub(crate) struct ProbeWindow {
    bytes: Vec<u8>,
    cap: usize,
}

impl ProbeWindow {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
        }
    }

    /// Copy the window's share of `chunk`. Returns `true` while the window
    /// still wants more prefix bytes.
    pub(crate) fn absorb(&mut self, chunk: &[u8]) -> bool {
        if self.bytes.len() < self.cap {
            let take = (self.cap - self.bytes.len()).min(chunk.len());
            self.bytes.extend_from_slice(&chunk[..take]);
        }
        self.bytes.len() < self.cap
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decode format and dimensions from the probe window and apply policy.
///
/// Failure order matches the policy taxonomy: unrecognized container or
/// load-disabled type, then per-axis dimension ceiling, then total
/// resolution ceiling. Decode failures that are not a recognition failure
/// surface as unexpected.
pub(crate) fn check_type_and_dimensions(
    prefix: &[u8],
    config: &Config,
) -> Result<ImageType, DownloadError> {
    let format = match imagesize::image_type(prefix) {
        Ok(format) => format,
        Err(ImageError::NotSupported) => return Err(DownloadError::UnsupportedType),
        Err(err) => {
            return Err(DownloadError::unexpected(format!(
                "format probe failed: {err}"
            )));
        }
    };

    let Some(kind) = ImageType::from_sniffed(format) else {
        return Err(DownloadError::UnsupportedType);
    };
    if !config.load_support.enabled(kind) {
        return Err(DownloadError::UnsupportedType);
    }

    let size = match imagesize::blob_size(prefix) {
        Ok(size) => size,
        Err(ImageError::NotSupported) => return Err(DownloadError::UnsupportedType),
        Err(err) => {
            return Err(DownloadError::unexpected(format!(
                "dimension probe failed: {err}"
            )));
        }
    };
    check_dimensions(size.width, size.height, config)?;

    Ok(kind)
}

pub(crate) fn check_dimensions(
    width: usize,
    height: usize,
    config: &Config,
) -> Result<(), DownloadError> {
    let max_dim = config.max_src_dimension;
    if max_dim > 0 && (width > max_dim || height > max_dim) {
        return Err(DownloadError::DimensionsTooBig);
    }

    let max_res = config.max_src_resolution;
    if max_res > 0 && width.saturating_mul(height) > max_res {
        return Err(DownloadError::ResolutionTooBig);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_prefix(width: u32, height: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        v.extend_from_slice(&13u32.to_be_bytes());
        v.extend_from_slice(b"IHDR");
        v.extend_from_slice(&width.to_be_bytes());
        v.extend_from_slice(&height.to_be_bytes());
        v.extend_from_slice(&[8, 6, 0, 0, 0]);
        v.extend_from_slice(&[0; 4]);
        v
    }

    #[test]
    fn test_probe_window_fanout_share() {
        let mut window = ProbeWindow::new(8);
        assert!(window.absorb(b"01234"));
        assert!(!window.absorb(b"5678"));
        assert_eq!(window.bytes(), b"01234567");

        // further chunks are ignored by the window
        assert!(!window.absorb(b"tail"));
        assert_eq!(window.bytes().len(), 8);
    }

    #[test]
    fn test_recognizes_png_and_dimensions() {
        let config = Config::default();
        let kind = check_type_and_dimensions(&png_prefix(20, 20), &config).unwrap();
        assert_eq!(kind, ImageType::Png);
    }

    #[test]
    fn test_unrecognized_container_is_unsupported() {
        let config = Config::default();
        let err = check_type_and_dimensions(b"certainly not an image", &config).unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedType));
    }

    #[test]
    fn test_load_disabled_type_is_unsupported() {
        let mut config = Config::default();
        config.load_support.png = false;
        let err = check_type_and_dimensions(&png_prefix(20, 20), &config).unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedType));
    }

    #[test]
    fn test_dimension_ceiling() {
        let mut config = Config::default();
        config.max_src_dimension = 16;
        let err = check_type_and_dimensions(&png_prefix(20, 20), &config).unwrap_err();
        assert!(matches!(err, DownloadError::DimensionsTooBig));
    }

    #[test]
    fn test_resolution_ceiling() {
        let mut config = Config::default();
        config.max_src_resolution = 1000;
        let err = check_type_and_dimensions(&png_prefix(50, 50), &config).unwrap_err();
        assert!(matches!(err, DownloadError::ResolutionTooBig));

        assert!(check_type_and_dimensions(&png_prefix(20, 20), &config).is_ok());
    }

    #[test]
    fn test_zero_limits_are_unlimited() {
        let mut config = Config::default();
        config.max_src_dimension = 0;
        config.max_src_resolution = 0;
        assert!(check_type_and_dimensions(&png_prefix(50_000, 50_000), &config).is_ok());
    }

    #[test]
    fn test_truncated_header_is_unexpected() {
        let config = Config::default();
        let err = check_type_and_dimensions(&png_prefix(20, 20)[..12], &config).unwrap_err();
        assert!(matches!(err, DownloadError::Unexpected { .. }));
    }
}
