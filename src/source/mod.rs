//! Image sources: local paths and remote URLs.

mod fetch;
mod remote;
mod sniff;

pub use fetch::{Fetcher, HttpFetcher};
pub use remote::RemoteSourceCache;
pub use sniff::{MagicSniffer, TypeSniffer};

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{PipelineError, Result};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    Local(PathBuf),
    Remote(Url),
}

impl SourceRef {
    /// `http://` and `https://` are remote, anything else is a local path.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PipelineError::invalid("empty image source"));
        }
        if is_remote(raw) {
            let url = Url::parse(raw)
                .map_err(|e| PipelineError::invalid(format!("bad source url `{raw}`: {e}")))?;
            return Ok(Self::Remote(url));
        }
        Ok(Self::Local(PathBuf::from(raw)))
    }

    /// Human-facing base name used in asset keys.
    ///
    /// Local: file stem. Remote: stem of the last URL path segment, or
    /// `remote` when the URL has no usable path.
    pub fn base_name(&self) -> String {
        match self {
            Self::Local(path) => stem(path).unwrap_or_else(|| "image".to_string()),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(Path::new)
                .and_then(stem)
                .unwrap_or_else(|| "remote".to_string()),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url.as_str()),
        }
    }
}

/// Check for a remote prefix without allocating.
pub fn is_remote(raw: &str) -> bool {
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_and_remote() {
        let local = SourceRef::parse("img/hero.png").unwrap();
        assert_eq!(local, SourceRef::Local(PathBuf::from("img/hero.png")));
        assert!(matches!(local, SourceRef::Local(_)));

        let remote = SourceRef::parse("https://x/y.png").unwrap();
        assert!(matches!(remote, SourceRef::Remote(_)));
        assert_eq!(remote.to_string(), "https://x/y.png");
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_url() {
        assert!(matches!(
            SourceRef::parse("  "),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            SourceRef::parse("http://"),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(SourceRef::parse("a/b/hero.png").unwrap().base_name(), "hero");
        assert_eq!(SourceRef::parse("https://x/y.png").unwrap().base_name(), "y");
        assert_eq!(SourceRef::parse("https://x/").unwrap().base_name(), "remote");
    }

    #[test]
    fn test_is_remote_prefix() {
        assert!(is_remote("HTTPS://x"));
        assert!(!is_remote("httpx.png"));
        assert!(!is_remote("./http/a.png"));
    }
}
