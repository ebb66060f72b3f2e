//! Command-line interface module.

mod args;
mod manifest;

pub use args::{Cli, Commands};
pub use manifest::{parse_manifest, read_manifest};
