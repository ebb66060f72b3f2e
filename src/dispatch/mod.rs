//! Request dispatch: one source plus raw config in, one [`Delivery`] out.
//!
//! ```text
//! handle(src, raw)
//!   ├─ RequestPlan::parse        (validation, no I/O)
//!   ├─ resolve source            (remote → disk cache, local → canonical path)
//!   ├─ VariantStore::load_source (decoded once per source)
//!   └─ per width, concurrently:
//!        AssetKey::build → VariantStore::get_or_compute → ImageBackend::transform
//! ```

mod descriptor;
#[cfg(test)]
pub(crate) mod fakes;
mod loader;

pub use descriptor::{Delivery, SourceEntry, data_uri};
pub use loader::ModuleLoader;

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::asset::{AssetKey, OptionsDigest, OutputMode, RequestPlan, TransformRequest};
use crate::debug;
use crate::error::{PipelineError, Result};
use crate::source::{RemoteSourceCache, SourceRef};
use crate::store::{Variant, VariantStore};
use crate::transform::{ImageBackend, LoadedSource, TransformOptions};

/// Turns transform requests into memoized variants.
pub struct TransformDispatcher {
    store: Arc<VariantStore>,
    backend: Arc<dyn ImageBackend>,
    remote: Arc<RemoteSourceCache>,
    namespace: String,
    root: PathBuf,
}

impl TransformDispatcher {
    /// `namespace` prefixes every asset key (e.g. `/assets/`); relative
    /// local sources resolve against `root`.
    pub fn new(
        store: Arc<VariantStore>,
        backend: Arc<dyn ImageBackend>,
        remote: Arc<RemoteSourceCache>,
        namespace: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            backend,
            remote,
            namespace: namespace.into(),
            root: root.into(),
        }
    }

    pub fn store(&self) -> &Arc<VariantStore> {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Dispatch one request.
    ///
    /// Config errors are reported before the source is touched.
    pub async fn handle<K, V>(&self, source: &str, raw: &[(K, V)]) -> Result<Delivery>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let plan = RequestPlan::parse(source, raw)?;
        let source_ref = SourceRef::parse(source)?;
        let mode = plan.mode;

        let (path, identity) = self.resolve(&source_ref).await?;
        let backend = Arc::clone(&self.backend);
        let loaded = self
            .store
            .load_source(identity.clone(), move || async move { backend.load(&path).await })
            .await?;

        let requests = plan.into_requests(&source_ref, loaded.format, loaded.native_width);
        let base = source_ref.base_name();
        let rendered = try_join_all(
            requests
                .into_iter()
                .map(|request| self.render(request, &base, &identity, &loaded)),
        )
        .await?;

        match mode {
            OutputMode::Inline(encoding) => {
                let [(_, variant)] = rendered.as_slice() else {
                    return Err(PipelineError::invalid(format!(
                        "inline request for `{source}` resolved to {} widths",
                        rendered.len()
                    )));
                };
                let bytes = materialize(variant).await?;
                Ok(Delivery::Inline(data_uri(&variant.mime, &bytes, encoding)))
            }
            OutputMode::File => Ok(Delivery::Sources(
                rendered
                    .into_iter()
                    .filter_map(|(width, variant)| {
                        let path = variant.delivery_path.clone()?;
                        Some(SourceEntry { path, width })
                    })
                    .collect(),
            )),
        }
    }

    /// Local path and identity string of a source.
    async fn resolve(&self, source: &SourceRef) -> Result<(PathBuf, String)> {
        match source {
            SourceRef::Remote(url) => {
                let path = self.remote.materialize(url).await?;
                Ok((path, url.as_str().to_string()))
            }
            SourceRef::Local(path) => {
                let joined = self.root.join(path);
                let canonical = tokio::fs::canonicalize(&joined)
                    .await
                    .map_err(|e| PipelineError::unavailable(joined.display().to_string(), e))?;
                let identity = canonical.display().to_string();
                Ok((canonical, identity))
            }
        }
    }

    async fn render(
        &self,
        request: TransformRequest,
        base: &str,
        identity: &str,
        loaded: &Arc<LoadedSource>,
    ) -> Result<(u32, Arc<Variant>)> {
        let width = request.width.resolve(loaded.native_width);
        let digest = OptionsDigest::compute(identity, request.mode, &request.encoder);
        let key = AssetKey::build(base, &self.namespace, request.format, width, digest);

        let backend = Arc::clone(&self.backend);
        let source = Arc::clone(loaded);
        let delivery_path = (!request.mode.is_inline()).then(|| key.to_string());
        let format = request.format;
        let options = TransformOptions {
            width,
            format,
            mode: request.mode,
            encoder: request.encoder,
        };

        let variant = self
            .store
            .get_or_compute(key.clone(), move || async move {
                debug!("transform"; "{key}");
                let rendered = backend
                    .transform(Arc::clone(&source), options)
                    .await
                    .map_err(|e| rekey(e, &key))?;
                Ok(Variant {
                    key,
                    format,
                    mime: rendered.mime,
                    payload: rendered.payload,
                    source,
                    delivery_path,
                })
            })
            .await?;

        Ok((width, variant))
    }
}

/// Report backend failures under the asset key they belong to.
fn rekey(err: PipelineError, key: &AssetKey) -> PipelineError {
    match err {
        PipelineError::TransformFailed { reason, .. } => PipelineError::transform(key.as_str(), reason),
        other => other,
    }
}

async fn materialize(variant: &Arc<Variant>) -> Result<Arc<[u8]>> {
    let payload = variant.payload.clone();
    let key = variant.key.to_string();
    tokio::task::spawn_blocking(move || payload.to_bytes())
        .await
        .map_err(|e| PipelineError::transform(&key, e))?
        .map_err(|e| PipelineError::transform(&key, e))
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeBackend, dispatcher};
    use super::*;
    use crate::core::ImageFormat;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remote_srcset_scenario() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, backend, fetcher) = dispatcher(&dir);

        let delivery = dispatcher
            .handle("https://x/y.png", &[("w", "320;640"), ("format", "webp")])
            .await
            .unwrap();

        let paths = delivery.paths();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
        assert_eq!(
            delivery.descriptor(),
            format!("{} 320w, {} 640w", paths[0], paths[1])
        );
        for path in &paths {
            assert!(path.starts_with("/assets/y@"));
            assert!(path.ends_with(".webp"));
            let variant = dispatcher.store().lookup_by_delivery_path(path).unwrap();
            assert_eq!(variant.mime, "image/webp");
        }
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(backend.loads(), 1);
        assert_eq!(backend.transforms(), 2);
    }

    #[tokio::test]
    async fn test_repeat_request_is_memoized() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, backend, fetcher) = dispatcher(&dir);
        let raw = [("w", "320;640"), ("format", "webp")];

        let first = dispatcher.handle("https://x/y.png", &raw).await.unwrap();
        let second = dispatcher.handle("https://x/y.png", &raw).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dispatcher.store().compute_count(), 2);
        assert_eq!(backend.transforms(), 2);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, backend, _) = dispatcher(&dir);
        let raw = [("w", "100")];

        let (a, b, c) = tokio::join!(
            dispatcher.handle("https://x/y.png", &raw),
            dispatcher.handle("https://x/y.png", &raw),
            dispatcher.handle("https://x/y.png", &raw),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(backend.transforms(), 1);
    }

    #[tokio::test]
    async fn test_inline_base64() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let delivery = dispatcher
            .handle("https://x/y.png", &[("inline", ""), ("w", "48")])
            .await
            .unwrap();
        let Delivery::Inline(uri) = &delivery else {
            panic!("expected inline delivery");
        };
        assert!(uri.starts_with("data:image/png;base64,"));
        // Inline variants are never served.
        assert!(dispatcher.store().file_variants_under("/").is_empty());
    }

    #[tokio::test]
    async fn test_inline_raw() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let delivery = dispatcher
            .handle("https://x/y.png", &[("raw", ""), ("w", "8"), ("format", "jpg")])
            .await
            .unwrap();
        assert!(delivery.descriptor().starts_with("data:image/jpeg,"));
    }

    #[tokio::test]
    async fn test_inline_two_widths_fails_before_any_io() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, backend, fetcher) = dispatcher(&dir);

        let err = dispatcher
            .handle("https://x/y.png", &[("inline", ""), ("w", "320;640")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(backend.loads(), 0);
    }

    #[tokio::test]
    async fn test_default_format_is_source_format() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let delivery = dispatcher.handle("https://x/y.png", &[("w", "10")]).await.unwrap();
        assert!(delivery.descriptor().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_native_width_resolves_after_load() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let delivery = dispatcher
            .handle::<&str, &str>("https://x/y.png", &[])
            .await
            .unwrap();
        let path = delivery.descriptor();
        assert!(path.contains(&format!("@{}w.", FakeBackend::NATIVE_WIDTH)));
    }

    #[tokio::test]
    async fn test_local_source() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hero.png"), b"pixels").unwrap();
        let (dispatcher, _, fetcher) = dispatcher(&dir);

        let delivery = dispatcher
            .handle("hero.png", &[("w", "200"), ("format", "avif")])
            .await
            .unwrap();
        assert!(delivery.descriptor().starts_with("/assets/hero@200w."));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_local_source() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let err = dispatcher
            .handle("missing.png", &[("w", "200")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_transform_failure_is_keyed_and_retried() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, backend, _) = dispatcher(&dir);
        backend.fail_next(true);

        let err = dispatcher
            .handle("https://x/y.png", &[("w", "64")])
            .await
            .unwrap_err();
        let PipelineError::TransformFailed { key, .. } = err else {
            panic!("expected TransformFailed, got {err:?}");
        };
        assert!(key.starts_with("/assets/y@64w."));

        backend.fail_next(false);
        assert!(dispatcher.handle("https://x/y.png", &[("w", "64")]).await.is_ok());
        assert_eq!(backend.transforms(), 2);
    }

    #[tokio::test]
    async fn test_same_base_name_different_sources() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = dispatcher(&dir);

        let a = dispatcher.handle("https://x/y.png", &[("w", "10")]).await.unwrap();
        let b = dispatcher.handle("https://z/y.png", &[("w", "10")]).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(
            ImageFormat::from_path(std::path::Path::new(&a.descriptor())),
            Some(ImageFormat::Png)
        );
    }
}
