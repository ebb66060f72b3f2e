//! Asset key derivation.
//!
//! An [`AssetKey`] names one rendered variant. Its layout is fixed:
//!
//! ```text
//! {namespace}{base}@{width}w.{digest}.{ext}
//! /assets/   hero  @640  w .3f9c…(32) .webp
//! ```
//!
//! The digest part covers the options digest, the width and the format, so
//! it identifies the variant on its own: a `[hash][extname]` file name
//! never maps two variants to one file.
//!
//! For file-mode variants the key doubles as the delivery path, so the
//! `[name]`/`[hash]`/`[ext]` parts of a build file name can be recovered
//! from it without a side table.

use std::fmt;

use super::request::{EncoderOptions, OutputMode};
use crate::core::{Digest, ImageFormat};

/// Digest over the source identity, delivery mode and encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionsDigest(Digest);

impl OptionsDigest {
    /// Hash `source_identity`, the mode, then every option pair in key order.
    ///
    /// `EncoderOptions` is a sorted map, so two requests that only differ in
    /// query ordering produce the same digest. Inline and file variants of
    /// the same rendering get distinct digests since only the latter is
    /// served and flushed.
    pub fn compute(source_identity: &str, mode: OutputMode, encoder: &EncoderOptions) -> Self {
        let mode: &[u8] = if mode.is_inline() { b"inline" } else { b"file" };
        let fields = [source_identity.as_bytes(), mode].into_iter().chain(
            encoder
                .iter()
                .flat_map(|(k, v)| [k.as_bytes(), v.as_bytes()]),
        );
        Self(Digest::of_fields(fields))
    }

    /// Digest of one concrete rendering: these options at `width` in `format`.
    fn variant(self, format: ImageFormat, width: u32) -> Digest {
        Digest::of_fields([
            self.0.as_bytes().as_slice(),
            format.extension().as_bytes(),
            width.to_le_bytes().as_slice(),
        ])
    }
}

/// Canonical identifier of one rendered variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey(String);

impl AssetKey {
    /// Build a key. Pure: the same inputs give the same key across runs.
    pub fn build(
        base_name: &str,
        namespace: &str,
        format: ImageFormat,
        width: u32,
        digest: OptionsDigest,
    ) -> Self {
        Self(format!(
            "{namespace}{}@{width}w.{}.{}",
            sanitize_base(base_name),
            digest.variant(format, width).short_hex(),
            format.extension()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (`hero@640w.<digest>.webp`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keep base names URL- and filesystem-safe.
fn sanitize_base(base: &str) -> String {
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Output namespace for a public base and assets directory.
///
/// ```ignore
/// namespace("/", "assets")       -> "/assets/"
/// namespace("/blog/", "_img")    -> "/blog/_img/"
/// ```
pub fn namespace(base: &str, assets_dir: &str) -> String {
    let base = base.trim_matches('/');
    let assets = assets_dir.trim_matches('/');
    match (base.is_empty(), assets.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{assets}/"),
        (false, true) => format!("/{base}/"),
        (false, false) => format!("/{base}/{assets}/"),
    }
}
