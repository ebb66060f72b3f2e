//! What a dispatched request hands back to the host.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{NON_ALPHANUMERIC, percent_encode};

use crate::asset::InlineEncoding;

/// One file-mode rendering in a srcset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: String,
    pub width: u32,
}

/// Result of a transform request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Complete `data:` URI.
    Inline(String),
    /// Delivery paths, in request order.
    Sources(Vec<SourceEntry>),
}

impl Delivery {
    /// String handed to the host: the data URI, a single path, or a srcset
    /// (`/a@320w.…webp 320w, /a@640w.…webp 640w`).
    pub fn descriptor(&self) -> String {
        match self {
            Self::Inline(uri) => uri.clone(),
            Self::Sources(sources) => match sources.as_slice() {
                [single] => single.path.clone(),
                many => many
                    .iter()
                    .map(|s| format!("{} {}w", s.path, s.width))
                    .collect::<Vec<_>>()
                    .join(", "),
            },
        }
    }

    /// Delivery paths in request order (empty for inline).
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Inline(_) => Vec::new(),
            Self::Sources(sources) => sources.iter().map(|s| s.path.as_str()).collect(),
        }
    }
}

/// Embed encoded bytes as a `data:` URI.
pub fn data_uri(mime: &str, bytes: &[u8], encoding: InlineEncoding) -> String {
    match encoding {
        InlineEncoding::Base64 => format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
        InlineEncoding::Raw => format!("data:{mime},{}", percent_encode(bytes, NON_ALPHANUMERIC)),
    }
}
