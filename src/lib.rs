//! imgcast - on-demand responsive image variants.
//!
//! A request names a source image plus transform parameters; the pipeline
//! returns a data URI or a srcset descriptor and keeps every rendered
//! variant in memory, keyed by a digest of what produced it. The dev server
//! serves those variants straight from memory; a production build flushes
//! them to disk exactly once.

pub mod logger;

pub mod asset;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod publish;
pub mod runner;
pub mod serve;
pub mod source;
pub mod store;
pub mod transform;

pub use error::{PipelineError, Result};
pub use runner::Pipeline;
