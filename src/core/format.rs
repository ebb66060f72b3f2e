//! Supported raster encodings.

use std::fmt;
use std::path::Path;

use super::mime::types;

/// Image encodings the pipeline accepts as sources and produces as variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageFormat {
    Avif,
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Every supported format, in the order the remote cache probes them.
    pub const ALL: [Self; 4] = [Self::Avif, Self::Jpeg, Self::Png, Self::Webp];

    /// Parse a format name or file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "avif" => Some(Self::Avif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Format implied by a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension (without dot).
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub const fn mime(self) -> &'static str {
        match self {
            Self::Avif => types::AVIF,
            Self::Jpeg => types::JPEG,
            Self::Png => types::PNG,
            Self::Webp => types::WEBP,
        }
    }

    /// Map the `image` crate's sniffed format onto the supported set.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Avif => Some(Self::Avif),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(ImageFormat::from_extension("JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("webp"), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::from_extension("bmp"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            ImageFormat::from_path(Path::new("/img/hero.avif")),
            Some(ImageFormat::Avif)
        );
        assert_eq!(ImageFormat::from_path(Path::new("/img/readme")), None);
    }

    #[test]
    fn test_extension_and_mime_agree() {
        for format in ImageFormat::ALL {
            let mime = crate::core::mime::from_extension(Some(format.extension()));
            assert_eq!(mime, format.mime());
        }
    }
}
