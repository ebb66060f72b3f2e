//! Content-based type detection for fetched bytes.

use crate::core::ImageFormat;

/// Detects an image type from its leading bytes.
pub trait TypeSniffer: Send + Sync {
    /// Supported format, or the name of whatever was detected instead.
    fn sniff(&self, bytes: &[u8]) -> Result<ImageFormat, String>;
}

/// Magic-number sniffer backed by `image::guess_format`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl TypeSniffer for MagicSniffer {
    fn sniff(&self, bytes: &[u8]) -> Result<ImageFormat, String> {
        let detected = image::guess_format(bytes).map_err(|_| "unknown".to_string())?;
        ImageFormat::from_image_format(detected)
            .ok_or_else(|| detected.extensions_str().first().map_or("unknown", |e| e).to_string())
    }
}
