//! In-memory backend and fetcher with call counters, for tests.

use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use url::Url;

use super::TransformDispatcher;
use crate::asset::OutputMode;
use crate::core::ImageFormat;
use crate::error::{PipelineError, Result};
use crate::source::{Fetcher, MagicSniffer, RemoteSourceCache};
use crate::store::VariantStore;
use crate::transform::{
    ImageBackend, LoadedSource, Payload, Rendered, StreamSource, TransformOptions,
};

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Backend that renders `"<format>:<width>"` as the payload.
#[derive(Default)]
pub struct FakeBackend {
    loads: AtomicUsize,
    transforms: AtomicUsize,
    fail: AtomicBool,
    broken_streams: AtomicBool,
}

impl FakeBackend {
    pub const NATIVE_WIDTH: u32 = 1200;

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn transforms(&self) -> usize {
        self.transforms.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// File-mode payloads rendered while set fail on every read.
    pub fn break_streams(&self, broken: bool) {
        self.broken_streams.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageBackend for FakeBackend {
    async fn load(&self, path: &Path) -> Result<LoadedSource> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
        Ok(LoadedSource::new(
            path,
            format,
            Self::NATIVE_WIDTH,
            Self::NATIVE_WIDTH / 2,
            Arc::new(()),
        ))
    }

    async fn transform(
        &self,
        source: Arc<LoadedSource>,
        options: TransformOptions,
    ) -> Result<Rendered> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::transform(
                source.path.display().to_string(),
                "synthetic failure",
            ));
        }

        let body = format!("{}:{}", options.format, options.width).into_bytes();
        let payload = match options.mode {
            OutputMode::Inline(_) => Payload::buffer(body),
            OutputMode::File if self.broken_streams.load(Ordering::SeqCst) => {
                Payload::Stream(Arc::new(Broken))
            }
            OutputMode::File => Payload::Stream(Arc::new(Body(body.into()))),
        };
        Ok(Rendered {
            mime: options.format.mime().to_string(),
            payload,
        })
    }
}

struct Body(Arc<[u8]>);

impl StreamSource for Body {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.0))))
    }
}

/// Stream whose every read fails.
pub struct Broken;

impl StreamSource for Broken {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::other("encoder failed"))
    }
}

/// Fetcher that always answers with PNG magic bytes.
#[derive(Default)]
pub struct FakeFetcher {
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn calls(&self) -> usize {
        self.urls.lock().len()
    }

    /// Every URL fetched so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        self.urls.lock().push(url.to_string());
        Ok(PNG_MAGIC.to_vec())
    }
}

/// Dispatcher over fakes, rooted at `dir`, namespace `/assets/`.
pub fn dispatcher(dir: &TempDir) -> (TransformDispatcher, Arc<FakeBackend>, Arc<FakeFetcher>) {
    let backend = Arc::new(FakeBackend::default());
    let fetcher = Arc::new(FakeFetcher::default());
    let remote = RemoteSourceCache::new(
        dir.path().join(".cache"),
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::new(MagicSniffer),
    );
    let dispatcher = TransformDispatcher::new(
        Arc::new(VariantStore::new()),
        Arc::clone(&backend) as Arc<dyn ImageBackend>,
        Arc::new(remote),
        "/assets/",
        dir.path(),
    );
    (dispatcher, backend, fetcher)
}
