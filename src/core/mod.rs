//! Core types - pure abstractions shared across the codebase.

mod digest;
mod driver;
mod format;
pub mod mime;

pub use digest::Digest;
pub use driver::BuildMode;
pub use format::ImageFormat;
