//! Wiring of the stores, dispatcher, dev server and flusher around one
//! [`PipelineConfig`].

use std::sync::Arc;

use futures::future::join_all;

use crate::config::PipelineConfig;
use crate::core::BuildMode;
use crate::dispatch::{ModuleLoader, TransformDispatcher};
use crate::error::{PipelineError, Result};
use crate::logger::ProgressLine;
use crate::publish::{FlushReport, PublishFlusher};
use crate::serve::DevServer;
use crate::source::{Fetcher, HttpFetcher, MagicSniffer, RemoteSourceCache};
use crate::store::VariantStore;
use crate::transform::{ImageBackend, RasterBackend};
use crate::{debug, log};

/// One pipeline instance: shared store plus every reader of it.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<VariantStore>,
    loader: ModuleLoader,
    flusher: PublishFlusher,
}

/// A module id that failed to dispatch.
#[derive(Debug)]
pub struct DispatchFailure {
    pub id: String,
    pub error: PipelineError,
}

impl Pipeline {
    /// Pipeline with the raster backend and an HTTP fetcher.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        Ok(Self::with_parts(config, Arc::new(RasterBackend::new()), fetcher))
    }

    pub fn with_parts(
        config: PipelineConfig,
        backend: Arc<dyn ImageBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let store = Arc::new(VariantStore::new());
        let namespace = config.namespace();
        let remote = RemoteSourceCache::new(&config.cache.dir, fetcher, Arc::new(MagicSniffer));
        let dispatcher = TransformDispatcher::new(
            Arc::clone(&store),
            backend,
            Arc::new(remote),
            namespace.clone(),
            config.root.clone(),
        );
        let flusher = PublishFlusher::new(
            Arc::clone(&store),
            namespace,
            config.build.assets_dir.trim_matches('/'),
        );

        Self {
            config,
            store,
            loader: ModuleLoader::new(Arc::new(dispatcher)),
            flusher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<VariantStore> {
        &self.store
    }

    /// Load every module id concurrently. Failures are logged and returned;
    /// they never stop the other ids.
    pub async fn dispatch_all(&self, ids: &[String]) -> Vec<DispatchFailure> {
        let progress = ProgressLine::new("images", ids.len());

        let outcomes = join_all(ids.iter().map(|id| {
            let progress = &progress;
            async move {
                let outcome = self.loader.load(id).await;
                progress.inc();
                (id, outcome)
            }
        }))
        .await;
        progress.finish();

        let mut failures = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Some(module)) => debug!("build"; "{id} -> {}", module.trim_end()),
                Ok(None) => log!("build"; "skipped `{id}`: not a supported image"),
                Err(error) => {
                    log!("error"; "{id}: {error}");
                    failures.push(DispatchFailure {
                        id: id.clone(),
                        error,
                    });
                }
            }
        }
        failures
    }

    /// Flush file variants into the configured output directory.
    pub async fn flush(&self, mode: BuildMode) -> Result<FlushReport> {
        self.flusher
            .flush(&self.config.build.output, &self.config.file_template(), mode)
            .await
    }

    pub fn dev_server(&self) -> DevServer {
        DevServer::new(Arc::clone(&self.store), &self.config.serve.public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use crate::dispatch::fakes::{FakeBackend, FakeFetcher};
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir) -> Pipeline {
        let mut config = test_parse_config("[build]\nassets_dir = \"_img\"");
        config.root = dir.path().to_path_buf();
        config.build.output = dir.path().join("dist");
        config.cache.dir = dir.path().join("cache");
        Pipeline::with_parts(
            config,
            Arc::new(FakeBackend::default()),
            Arc::new(FakeFetcher::default()),
        )
    }

    #[tokio::test]
    async fn test_dispatch_all_collects_failures() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let ids = vec![
            "https://x/a.png?w=100;200".to_string(),
            "https://x/b.png?inline&w=1;2".to_string(),
            "styles.css".to_string(),
        ];

        let failures = pipeline.dispatch_all(&ids).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, ids[1]);
        assert!(matches!(failures[0].error, PipelineError::InvalidConfig(_)));
        assert_eq!(pipeline.store().file_variants_under("/_img/").len(), 2);
    }

    #[tokio::test]
    async fn test_build_flow_writes_into_assets_dir() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let ids = vec!["https://x/a.png?w=100;200&format=avif".to_string()];

        assert!(pipeline.dispatch_all(&ids).await.is_empty());
        let report = pipeline.flush(BuildMode::PRODUCTION).await.unwrap();
        assert_eq!(report.written.len(), 2);
        for path in &report.written {
            assert!(path.starts_with(dir.path().join("dist/_img")));
            assert_eq!(path.extension().unwrap(), "avif");
        }
    }
}
