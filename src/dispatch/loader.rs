//! Module-id hook: `hero.png?w=320;640&format=webp` → JS module text.
//!
//! Remote ids share their query with the URL itself. There only the known
//! transform keys are taken as options; every other pair stays on the URL
//! that gets fetched:
//!
//! ```text
//! https://cdn/x.png?token=abc&w=320  →  source https://cdn/x.png?token=abc, options w=320
//! ```

use std::path::Path;
use std::sync::Arc;

use url::form_urlencoded;

use super::TransformDispatcher;
use crate::asset::is_transform_key;
use crate::core::ImageFormat;
use crate::error::Result;
use crate::source::is_remote;

/// Answers module-id loads for image imports.
pub struct ModuleLoader {
    dispatcher: Arc<TransformDispatcher>,
}

impl ModuleLoader {
    pub fn new(dispatcher: Arc<TransformDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Generated module for `id`, or `None` when the id is not an image
    /// this pipeline handles.
    pub async fn load(&self, id: &str) -> Result<Option<String>> {
        let Some((source, query)) = split_id(id) else {
            return Ok(None);
        };
        let pairs = form_urlencoded::parse(query.as_bytes()).into_owned();
        let (source, raw) = if is_remote(source) {
            split_remote_query(source, pairs)
        } else {
            (source.to_string(), pairs.collect())
        };

        let delivery = self.dispatcher.handle(&source, &raw).await?;
        Ok(Some(export_default(&delivery.descriptor())))
    }
}

/// Split into source and query, keeping only supported image ids.
fn split_id(id: &str) -> Option<(&str, &str)> {
    let (source, query) = id.split_once('?').unwrap_or((id, ""));
    if source.is_empty() {
        return None;
    }
    let path = if is_remote(source) {
        source.rsplit('/').next().unwrap_or(source)
    } else {
        source
    };
    ImageFormat::from_path(Path::new(path)).map(|_| (source, query))
}

/// Take transform keys as options and put the rest back on the URL.
fn split_remote_query(
    url: &str,
    pairs: impl Iterator<Item = (String, String)>,
) -> (String, Vec<(String, String)>) {
    let (options, kept): (Vec<_>, Vec<_>) = pairs.partition(|(key, _)| is_transform_key(key));
    if kept.is_empty() {
        return (url.to_string(), options);
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&kept)
        .finish();
    (format!("{url}?{query}"), options)
}

/// `export default "<escaped>";`
fn export_default(value: &str) -> String {
    format!("export default {};\n", serde_json::Value::from(value))
}
