//! Configuration section definitions.

mod build;
mod cache;
mod serve;

pub use build::BuildConfig;
pub use cache::CacheConfig;
pub use serve::ServeConfig;
