//! `[cache]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! dir = ".imgcast/cache"   # Remote sources are materialized here
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Remote source cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache directory (relative to the project root).
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".imgcast/cache"),
        }
    }
}
