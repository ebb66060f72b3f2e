//! Process-lifetime memo of rendered variants.
//!
//! A key is a pure function of the source identity and its options, so a
//! completed variant stays valid for the life of the process. The one
//! exception is a variant whose payload fails to read: readers evict it and
//! the next request recomputes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use percent_encoding::percent_decode_str;

use super::SingleFlight;
use crate::asset::AssetKey;
use crate::core::ImageFormat;
use crate::error::Result;
use crate::transform::{LoadedSource, Payload};

/// A completed rendering.
#[derive(Debug)]
pub struct Variant {
    pub key: AssetKey,
    pub format: ImageFormat,
    pub mime: String,
    pub payload: Payload,
    pub source: Arc<LoadedSource>,
    /// Set for file-mode variants only.
    pub delivery_path: Option<String>,
}

impl Variant {
    pub const fn is_file(&self) -> bool {
        self.delivery_path.is_some()
    }
}

/// Key → variant memo with single-flight computation.
pub struct VariantStore {
    variants: SingleFlight<AssetKey, Arc<Variant>>,
    by_path: Arc<DashMap<String, Arc<Variant>>>,
    sources: SingleFlight<String, Arc<LoadedSource>>,
    computations: Arc<AtomicUsize>,
}

impl VariantStore {
    pub fn new() -> Self {
        Self {
            variants: SingleFlight::new(),
            by_path: Arc::new(DashMap::new()),
            sources: SingleFlight::new(),
            computations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Completed variant for `key`, computing it at most once.
    ///
    /// Concurrent callers for the same key share one `compute`. A failed
    /// computation is reported to all of them and leaves no entry.
    pub async fn get_or_compute<F, Fut>(&self, key: AssetKey, compute: F) -> Result<Arc<Variant>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Variant>> + Send + 'static,
    {
        let by_path = Arc::clone(&self.by_path);
        let computations = Arc::clone(&self.computations);

        self.variants
            .get_or_try_init(key, move || {
                computations.fetch_add(1, Ordering::Relaxed);
                let pending = compute();
                async move {
                    let variant = Arc::new(pending.await?);
                    if let Some(path) = &variant.delivery_path {
                        by_path.insert(path.clone(), Arc::clone(&variant));
                    }
                    Ok(variant)
                }
            })
            .await
    }

    pub fn get(&self, key: &AssetKey) -> Option<Arc<Variant>> {
        self.variants.get(key)
    }

    /// Forget a completed variant. Returns `false` when `key` was absent or
    /// still pending.
    pub fn evict(&self, key: &AssetKey) -> bool {
        let Some(variant) = self.variants.remove_ready(key) else {
            return false;
        };
        if let Some(path) = &variant.delivery_path {
            self.by_path
                .remove_if(path, |_, indexed| Arc::ptr_eq(indexed, &variant));
        }
        true
    }

    /// Completed file-mode variant served at `path`.
    ///
    /// Query strings and fragments are ignored; percent-escapes are decoded.
    pub fn lookup_by_delivery_path(&self, path: &str) -> Option<Arc<Variant>> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if let Some(hit) = self.by_path.get(path) {
            return Some(Arc::clone(hit.value()));
        }
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        self.by_path.get(decoded.as_ref()).map(|hit| Arc::clone(hit.value()))
    }

    /// Completed file-mode variants whose delivery path starts with
    /// `namespace`, sorted by key.
    pub fn file_variants_under(&self, namespace: &str) -> Vec<Arc<Variant>> {
        let mut found: Vec<_> = self
            .by_path
            .iter()
            .filter(|entry| entry.key().starts_with(namespace))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        found
    }

    /// Decoded source for `identity`, loaded at most once.
    pub async fn load_source<F, Fut>(&self, identity: String, loader: F) -> Result<Arc<LoadedSource>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedSource>> + Send + 'static,
    {
        self.sources
            .get_or_try_init(identity, move || {
                let pending = loader();
                async move { pending.await.map(Arc::new) }
            })
            .await
    }

    /// Number of variant computations started so far.
    pub fn compute_count(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Number of pending and completed variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl Default for VariantStore {
    fn default() -> Self {
        Self::new()
    }
}
