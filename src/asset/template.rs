//! Build file name templates.
//!
//! Recognized placeholders: `[name]`, `[hash]`, `[ext]` (no dot) and
//! `[extname]` (with dot). The template is tokenized once; substituted
//! values are emitted verbatim and never scanned again, so a name that
//! itself contains `[hash]` stays intact.

use std::fmt;

/// Parts of a delivery path used to name the written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParts {
    pub name: String,
    pub hash: String,
    pub ext: String,
}

impl FileParts {
    /// Split `/ns/hero@640w.<hash>.webp` into name, hash and extension.
    ///
    /// `name` is everything before the last dot of the stem, `hash` what
    /// follows it. A stem without a dot has an empty hash.
    pub fn from_delivery_path(path: &str) -> Self {
        let file = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = match file.rfind('.') {
            Some(i) if i > 0 => (&file[..i], &file[i + 1..]),
            _ => (file, ""),
        };
        let (name, hash) = match stem.rfind('.') {
            Some(i) => (&stem[..i], &stem[i + 1..]),
            None => (stem, ""),
        };
        Self {
            name: name.to_string(),
            hash: hash.to_string(),
            ext: ext.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    Hash,
    Ext,
    ExtName,
}

/// Pre-tokenized file name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    pub const DEFAULT: &'static str = "[name].[hash][extname]";

    /// Tokenize a template. Unknown `[...]` groups are kept literally.
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open..];
            let Some(close) = after.find(']') else {
                rest = after;
                break;
            };
            let token = match &after[1..close] {
                "name" => Some(Segment::Name),
                "hash" => Some(Segment::Hash),
                "ext" => Some(Segment::Ext),
                "extname" => Some(Segment::ExtName),
                _ => None,
            };
            match token {
                Some(segment) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                None => literal.push_str(&after[..=close]),
            }
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: template.to_string(),
            segments,
        }
    }

    /// Resolve every placeholder in a single pass.
    pub fn render(&self, parts: &FileParts) -> String {
        let mut out = String::with_capacity(self.source.len() + parts.name.len() + 48);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(&parts.name),
                Segment::Hash => out.push_str(&parts.hash),
                Segment::Ext => out.push_str(&parts.ext),
                Segment::ExtName => {
                    if !parts.ext.is_empty() {
                        out.push('.');
                        out.push_str(&parts.ext);
                    }
                }
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self::parse(Self::DEFAULT)
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
