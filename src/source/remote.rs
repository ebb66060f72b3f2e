//! Disk cache for remote sources.
//!
//! Layout is flat: `<dir>/<token>.<ext>`, where `token` is the full blake3
//! hex digest of the URL and `ext` the sniffed format. A file on disk is a
//! hit across restarts; a miss fetches once, even under concurrent callers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use super::{Fetcher, TypeSniffer};
use crate::core::{Digest, ImageFormat};
use crate::error::{PipelineError, Result};
use crate::store::SingleFlight;
use crate::{debug, log};

/// URL → stable local path, fetched at most once per URL.
pub struct RemoteSourceCache {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    sniffer: Arc<dyn TypeSniffer>,
    flights: SingleFlight<String, PathBuf>,
}

impl RemoteSourceCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        sniffer: Arc<dyn TypeSniffer>,
    ) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            sniffer,
            flights: SingleFlight::new(),
        }
    }

    /// Fixed-length cache token for a URL.
    pub fn token(url: &Url) -> String {
        Digest::of(url.as_str()).to_hex()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path holding the bytes of `url`.
    pub async fn materialize(&self, url: &Url) -> Result<PathBuf> {
        let token = Self::token(url);
        let job = Job {
            dir: self.dir.clone(),
            token: token.clone(),
            url: url.clone(),
            fetcher: Arc::clone(&self.fetcher),
            sniffer: Arc::clone(&self.sniffer),
        };
        self.flights.get_or_try_init(token, move || job.run()).await
    }
}

struct Job {
    dir: PathBuf,
    token: String,
    url: Url,
    fetcher: Arc<dyn Fetcher>,
    sniffer: Arc<dyn TypeSniffer>,
}

impl Job {
    async fn run(self) -> Result<PathBuf> {
        if let Some(hit) = self.cached().await {
            debug!("fetch"; "cache hit {} -> {}", self.url, hit.display());
            return Ok(hit);
        }

        log!("fetch"; "{}", self.url);
        let bytes = self.fetcher.fetch(&self.url).await?;
        let format = self
            .sniffer
            .sniff(&bytes)
            .map_err(|found| PipelineError::unsupported(self.url.as_str(), found))?;

        let target = self.path_for(format);
        self.write(&target, &bytes).await?;
        Ok(target)
    }

    async fn cached(&self) -> Option<PathBuf> {
        for format in ImageFormat::ALL {
            let path = self.path_for(format);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }

    fn path_for(&self, format: ImageFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.token, format.extension()))
    }

    /// Write through a per-process `.part` file, then rename. A crash never
    /// leaves a truncated hit, and two processes never share a temp file.
    async fn write(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PipelineError::io(&self.dir, &e))?;

        let part = self.dir.join(part_name(target, std::process::id()));
        tokio::fs::write(&part, bytes)
            .await
            .map_err(|e| PipelineError::io(&part, &e))?;
        tokio::fs::rename(&part, target)
            .await
            .map_err(|e| PipelineError::io(target, &e))
    }
}

/// `<token>.<ext>.<pid>.part`
fn part_name(target: &Path, pid: u32) -> String {
    let file = target
        .file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    format!("{file}.{pid}.part")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MagicSniffer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct FakeFetcher {
        body: Result<Vec<u8>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(body: Result<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.body.clone()
        }
    }

    fn cache_for(dir: &TempDir, fetcher: &Arc<FakeFetcher>) -> RemoteSourceCache {
        RemoteSourceCache::new(
            dir.path().join("remote"),
            Arc::clone(fetcher) as Arc<dyn Fetcher>,
            Arc::new(MagicSniffer),
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_materialize_fetches_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new(Ok(PNG_MAGIC.to_vec()));
        let cache = cache_for(&dir, &fetcher);
        let u = url("https://x/y.png");

        let (a, b) = tokio::join!(cache.materialize(&u), cache.materialize(&u));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(fetcher.calls(), 1);

        let expected = format!("{}.png", RemoteSourceCache::token(&u));
        assert_eq!(a.file_name().unwrap().to_str().unwrap(), expected);
        assert_eq!(std::fs::read(&a).unwrap(), PNG_MAGIC);

        cache.materialize(&u).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_second_materialize_never_rewrites() {
        let dir = TempDir::new().unwrap();
        let u = url("https://x/y.png");
        let fetcher = FakeFetcher::new(Ok(PNG_MAGIC.to_vec()));
        let cache = cache_for(&dir, &fetcher);

        let path = cache.materialize(&u).await.unwrap();
        // Any later write would replace this marker.
        std::fs::write(&path, b"marker").unwrap();

        assert_eq!(cache.materialize(&u).await.unwrap(), path);
        let restarted = FakeFetcher::new(Ok(PNG_MAGIC.to_vec()));
        let again = cache_for(&dir, &restarted).materialize(&u).await.unwrap();
        assert_eq!(again, path);

        assert_eq!(std::fs::read(&path).unwrap(), b"marker");
        assert_eq!(fetcher.calls() + restarted.calls(), 1);
        let entries: Vec<_> = std::fs::read_dir(cache.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_part_name_is_per_process() {
        let target = Path::new("/cache/abc.png");
        assert_eq!(part_name(target, 42), "abc.png.42.part");
        assert_ne!(part_name(target, 42), part_name(target, 43));
    }

    #[tokio::test]
    async fn test_disk_hit_survives_restart() {
        let dir = TempDir::new().unwrap();
        let u = url("https://x/photo");

        let first = FakeFetcher::new(Ok(PNG_MAGIC.to_vec()));
        let path = cache_for(&dir, &first).materialize(&u).await.unwrap();

        let second = FakeFetcher::new(Ok(Vec::new()));
        let again = cache_for(&dir, &second).materialize(&u).await.unwrap();
        assert_eq!(path, again);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_sniffed_type_beats_url_extension() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new(Ok(b"\xff\xd8\xff\xe0rest".to_vec()));
        let path = cache_for(&dir, &fetcher)
            .materialize(&url("https://x/y.png"))
            .await
            .unwrap();
        assert_eq!(path.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_unsupported_type_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new(Ok(b"GIF89a\x01\0\x01\0".to_vec()));
        let cache = cache_for(&dir, &fetcher);

        let err = cache.materialize(&url("https://x/a.gif")).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert!(!cache.dir().exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_retried() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new(Err(PipelineError::unavailable("https://x/y.png", "503")));
        let cache = cache_for(&dir, &fetcher);
        let u = url("https://x/y.png");

        for _ in 0..2 {
            let err = cache.materialize(&u).await.unwrap_err();
            assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
        }
        assert_eq!(fetcher.calls(), 2);
    }
}
