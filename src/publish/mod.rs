//! Build-end flush of file-mode variants.
//!
//! Every completed variant under the output namespace is written exactly
//! once per process, named by the build's [`FilenameTemplate`]:
//!
//! ```text
//! /assets/hero@640w.3f9c….webp  ──[name].[hash][extname]──>  dist/assets/hero@640w.3f9c….webp
//! ```

mod record;

pub use record::{Claim, FlushRecord};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;

use crate::asset::{FileParts, FilenameTemplate};
use crate::core::BuildMode;
use crate::error::{PipelineError, Result};
use crate::store::{Variant, VariantStore};
use crate::{debug, log};

/// Outcome of one flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Files written, in key order.
    pub written: Vec<PathBuf>,
    /// Per-file failures; the rest of the flush still ran.
    pub failures: Vec<PipelineError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes variants from a [`VariantStore`] into the build output.
pub struct PublishFlusher {
    store: Arc<VariantStore>,
    namespace: String,
    assets_dir: PathBuf,
    record: FlushRecord,
}

impl PublishFlusher {
    /// `namespace` selects which delivery paths are flushed; files land
    /// under `<out_dir>/<assets_dir>`.
    pub fn new(
        store: Arc<VariantStore>,
        namespace: impl Into<String>,
        assets_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            assets_dir: assets_dir.into(),
            record: FlushRecord::new(),
        }
    }

    pub fn record(&self) -> &FlushRecord {
        &self.record
    }

    /// Write every not-yet-flushed variant. No-op outside production.
    ///
    /// Fails as a whole only when the assets directory cannot be created.
    pub async fn flush(
        &self,
        out_dir: &Path,
        template: &FilenameTemplate,
        mode: BuildMode,
    ) -> Result<FlushReport> {
        if !mode.write_assets {
            debug!("build"; "skip flush outside production");
            return Ok(FlushReport::default());
        }

        let pending: Vec<Arc<Variant>> = self
            .store
            .file_variants_under(&self.namespace)
            .into_iter()
            .filter(|variant| !self.record.contains(&variant.key))
            .collect();
        if pending.is_empty() {
            return Ok(FlushReport::default());
        }

        let assets_dir = out_dir.join(&self.assets_dir);
        tokio::fs::create_dir_all(&assets_dir)
            .await
            .map_err(|e| PipelineError::io(&assets_dir, &e))?;

        let mut report = FlushReport::default();
        let mut writes = Vec::new();
        for variant in pending {
            let target = assets_dir.join(file_name(&variant, template));
            match self.record.claim(&variant.key, &target) {
                Claim::Granted => writes.push(self.write(variant, target)),
                Claim::Flushed => {}
                Claim::Taken(owner) => report.failures.push(PipelineError::invalid(format!(
                    "`{}` and `{owner}` both map to {}",
                    variant.key,
                    target.display()
                ))),
            }
        }

        for outcome in join_all(writes).await {
            match outcome {
                Ok(path) => report.written.push(path),
                Err(e) => report.failures.push(e),
            }
        }
        for failure in &report.failures {
            log!("error"; "{failure}");
        }

        log!("flush"; "{} image(s) written to {}", report.written.len(), assets_dir.display());
        Ok(report)
    }

    /// Write one claimed variant. A failure releases the claim; an
    /// unreadable payload also drops the variant so it is recomputed.
    async fn write(&self, variant: Arc<Variant>, target: PathBuf) -> Result<PathBuf> {
        match write_variant(&variant, &target).await {
            Ok(()) => Ok(target),
            Err(e) => {
                self.record.release(&variant.key, &target);
                if matches!(e, PipelineError::TransformFailed { .. }) {
                    self.store.evict(&variant.key);
                }
                Err(e)
            }
        }
    }
}

fn file_name(variant: &Variant, template: &FilenameTemplate) -> String {
    let path = variant
        .delivery_path
        .as_deref()
        .unwrap_or_else(|| variant.key.as_str());
    template.render(&FileParts::from_delivery_path(path))
}

async fn write_variant(variant: &Variant, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, &e))?;
    }

    let payload = variant.payload.clone();
    let bytes = tokio::task::spawn_blocking(move || payload.to_bytes())
        .await
        .map_err(|e| PipelineError::transform(variant.key.as_str(), e))?
        .map_err(|e| PipelineError::transform(variant.key.as_str(), e))?;

    tokio::fs::write(target, &bytes)
        .await
        .map_err(|e| PipelineError::io(target, &e))
}
