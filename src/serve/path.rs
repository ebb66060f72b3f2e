//! Request URL to static file resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// File under `root` for `url`, falling back to `index.html` for
/// directories. Anything that escapes `root` (`..`, symlinks) is `None`.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let relative = relative_path(url)?;

    let root = root.canonicalize().ok()?;
    let canonical = root.join(relative.as_ref()).canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decoded path without query, leading or trailing slashes.
fn relative_path(url: &str) -> Option<Cow<'_, str>> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    if decoded.split('/').any(|segment| segment == "..") || decoded.contains('\0') {
        return None;
    }
    Some(match decoded {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_matches('/')),
        Cow::Owned(s) => Cow::Owned(s.trim_matches('/').to_string()),
    })
}
