//! Startup configuration, read-only once the downloader is constructed.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::image::ImageType;

/// Configuration for the acquisition subsystem.
///
/// All knobs are fixed at startup; nothing here is reloaded at runtime.
/// Limits set to `0` are disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum simultaneous in-flight downloads. Also sizes the buffer pool
    /// and the HTTP client's idle-connection ceiling, so pool exhaustion is
    /// the only concurrency gate.
    pub concurrency: usize,

    /// Overall time budget for one network fetch, including the body read.
    pub download_timeout: Duration,

    /// Skip TLS certificate verification on the shared HTTP client.
    pub ignore_ssl_verification: bool,

    /// `User-Agent` header sent with every network request.
    pub user_agent: String,

    /// Root directory served by the `local` scheme. `None` leaves the
    /// scheme unregistered.
    pub local_fs_root: Option<PathBuf>,

    /// Object-store schemes that must have a transport registered at
    /// startup. Enabling a scheme without supplying its transport fails
    /// registry construction.
    pub object_stores: Vec<String>,

    /// Hard ceiling on source byte length. Exceeding it mid-stream is a
    /// terminal failure, not a truncation.
    pub max_src_file_size: usize,

    /// Per-axis pixel ceiling.
    pub max_src_dimension: usize,

    /// Total-pixel ceiling (width × height).
    pub max_src_resolution: usize,

    /// How many leading bytes the metadata probe may scan before deciding.
    pub max_scan_bytes: usize,

    /// Buffer capacity used when the source length is unknown.
    pub download_buffer_size: usize,

    /// Log unreachable-source failures at warning level for alerting.
    pub report_download_errors: bool,

    /// Response-cache capacity in entries.
    pub cache_entries: usize,

    /// Which detected image types may be loaded.
    pub load_support: LoadSupport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 8,
            download_timeout: Duration::from_secs(10),
            ignore_ssl_verification: false,
            user_agent: concat!("imgsource/", env!("CARGO_PKG_VERSION")).to_string(),
            local_fs_root: None,
            object_stores: Vec::new(),
            max_src_file_size: 0,
            max_src_dimension: 8192,
            max_src_resolution: 16_777_216,
            max_scan_bytes: 32 * 1024,
            download_buffer_size: 256 * 1024,
            report_download_errors: false,
            cache_entries: 500,
            load_support: LoadSupport::default(),
        }
    }
}

/// Per-type load-support flags. A recognized format whose flag is off is
/// rejected the same way an unrecognized one is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSupport {
    pub png: bool,
    pub jpeg: bool,
    pub gif: bool,
    pub webp: bool,
    pub bmp: bool,
    pub tiff: bool,
    pub heif: bool,
}

impl Default for LoadSupport {
    fn default() -> Self {
        Self {
            png: true,
            jpeg: true,
            gif: true,
            webp: true,
            bmp: false,
            tiff: false,
            heif: false,
        }
    }
}

impl LoadSupport {
    pub fn enabled(&self, kind: ImageType) -> bool {
        match kind {
            ImageType::Png => self.png,
            ImageType::Jpeg => self.jpeg,
            ImageType::Gif => self.gif,
            ImageType::Webp => self.webp,
            ImageType::Bmp => self.bmp,
            ImageType::Tiff => self.tiff,
            ImageType::Heif => self.heif,
        }
    }

    /// Every type enabled.
    pub fn all() -> Self {
        Self {
            png: true,
            jpeg: true,
            gif: true,
            webp: true,
            bmp: true,
            tiff: true,
            heif: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.cache_entries, 500);
        assert_eq!(config.max_src_file_size, 0);
        assert!(config.load_support.png);
        assert!(!config.load_support.tiff);
    }

    #[test]
    fn test_empty_document_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.concurrency, Config::default().concurrency);
        assert_eq!(config.user_agent, Config::default().user_agent);
    }

    #[test]
    fn test_partial_overrides() {
        let config: Config = serde_json::from_str(
            r#"{"concurrency": 2, "max_src_file_size": 1000, "load_support": {"gif": false}}"#,
        )
        .unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_src_file_size, 1000);
        assert!(!config.load_support.enabled(ImageType::Gif));
        assert!(config.load_support.enabled(ImageType::Png));
    }
}
