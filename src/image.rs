//! Image types and the acquired-image artifact.

use std::fmt;

use crate::pool::PooledBuf;

/// Source formats the gateway knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Tiff,
    Heif,
}

impl ImageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Heif => "heif",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Heif => "image/heif",
        }
    }

    /// Map the sniffer's format report onto the gateway's type set.
    /// Formats the gateway never loads come back as `None`.
    pub(crate) fn from_sniffed(format: imagesize::ImageType) -> Option<Self> {
        use imagesize::ImageType as Sniffed;

        match format {
            Sniffed::Png => Some(Self::Png),
            Sniffed::Jpeg => Some(Self::Jpeg),
            Sniffed::Gif => Some(Self::Gif),
            Sniffed::Webp => Some(Self::Webp),
            Sniffed::Bmp => Some(Self::Bmp),
            Sniffed::Tiff => Some(Self::Tiff),
            Sniffed::Heif(_) => Some(Self::Heif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The validated raw bytes of one source image, held in a pooled buffer.
///
/// Created only after validation succeeded and the body was fully read.
/// Dropping it returns the buffer to the pool; that drop is the release
/// capability and happens exactly once on every path.
pub struct ImageData {
    buf: PooledBuf,
    kind: ImageType,
}

impl ImageData {
    pub(crate) fn new(buf: PooledBuf, kind: ImageType) -> Self {
        Self { buf, kind }
    }

    pub fn kind(&self) -> ImageType {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_type_strings() {
        assert_eq!(ImageType::Png.as_str(), "png");
        assert_eq!(ImageType::Jpeg.content_type(), "image/jpeg");
        assert_eq!(format!("{}", ImageType::Webp), "webp");
    }

    #[test]
    fn test_from_sniffed_known_and_unknown() {
        assert_eq!(
            ImageType::from_sniffed(imagesize::ImageType::Png),
            Some(ImageType::Png)
        );
        assert_eq!(ImageType::from_sniffed(imagesize::ImageType::Psd), None);
    }
}
