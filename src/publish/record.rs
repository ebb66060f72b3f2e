//! Keys already written by earlier flushes.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::asset::AssetKey;

/// Result of [`FlushRecord::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the write.
    Granted,
    /// Already written, or being written by an overlapping flush.
    Flushed,
    /// Another key already owns this target file.
    Taken(AssetKey),
}

#[derive(Debug, Default)]
struct Claims {
    keys: FxHashSet<AssetKey>,
    targets: FxHashMap<PathBuf, AssetKey>,
}

/// Append-only set of flushed keys and the files they own.
///
/// A key is claimed before its write starts, so overlapping flushes never
/// write the same file twice. A failed write releases the claim.
#[derive(Debug, Default)]
pub struct FlushRecord {
    claims: Mutex<Claims>,
}

impl FlushRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the write of `key` into `target`.
    pub fn claim(&self, key: &AssetKey, target: &Path) -> Claim {
        let mut claims = self.claims.lock();
        if claims.keys.contains(key) {
            return Claim::Flushed;
        }
        if let Some(owner) = claims.targets.get(target) {
            return Claim::Taken(owner.clone());
        }
        claims.keys.insert(key.clone());
        claims.targets.insert(target.to_path_buf(), key.clone());
        Claim::Granted
    }

    pub fn release(&self, key: &AssetKey, target: &Path) {
        let mut claims = self.claims.lock();
        claims.keys.remove(key);
        if claims.targets.get(target) == Some(key) {
            claims.targets.remove(target);
        }
    }

    pub fn contains(&self, key: &AssetKey) -> bool {
        self.claims.lock().keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.claims.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.lock().keys.is_empty()
    }
}
