//! Manifest files: the module ids a build or serve run dispatches.
//!
//! ```text
//! # hero images
//! img/hero.jpg?w=320;640;1280&format=avif
//! https://example.com/logo.png?inline&w=48
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Module ids in file order, without blanks, comments or duplicates.
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    Ok(parse_manifest(&content))
}

pub fn parse_manifest(content: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !ids.iter().any(|id| id == line) {
            ids.push(line.to_string());
        }
    }
    ids
}
