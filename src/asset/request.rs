//! Transform request parsing.
//!
//! Raw config is the ordered list of query pairs attached to a module id:
//!
//! ```text
//! hero.png?w=320;640&format=webp&quality=70
//! hero.png?inline&w=48
//! ```
//!
//! | Key                      | Meaning                                  |
//! |--------------------------|------------------------------------------|
//! | `w`, `width`, `widths`   | widths, split on `;` `,` or space, or `native` |
//! | `format`, `f`            | target encoding (defaults to the source's) |
//! | `inline`, `base64`       | inline base64 data URI                   |
//! | `raw`                    | inline percent-encoded data URI          |
//! | anything else            | encoder option (`quality`, `effort`, …)  |

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::core::ImageFormat;
use crate::error::{PipelineError, Result};
use crate::source::SourceRef;

/// Requested pixel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetWidth {
    Pixels(NonZeroU32),
    /// The source's own width, known only after loading it.
    Native,
}

impl TargetWidth {
    pub fn resolve(self, native_width: u32) -> u32 {
        match self {
            Self::Pixels(px) => px.get(),
            Self::Native => native_width,
        }
    }
}

/// How an inline variant is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineEncoding {
    Base64,
    Raw,
}

/// Delivery mode of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    Inline(InlineEncoding),
    File,
}

impl OutputMode {
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

/// Encoder parameters, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EncoderOptions(BTreeMap<String, String>);

impl EncoderOptions {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `quality` clamped to 1..=100.
    pub fn quality(&self) -> Option<u8> {
        let q: u32 = self.get("quality")?.trim().parse().ok()?;
        Some(q.clamp(1, 100) as u8)
    }

    /// `effort` clamped to 0..=10 (encoder speed knob).
    pub fn effort(&self) -> Option<u8> {
        let e: u32 = self.get("effort")?.trim().parse().ok()?;
        Some(e.min(10) as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One normalized request for a single width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub source: SourceRef,
    pub width: TargetWidth,
    pub format: ImageFormat,
    pub mode: OutputMode,
    pub encoder: EncoderOptions,
}

/// Query keys [`RequestPlan::parse`] and the encoders understand.
pub const TRANSFORM_KEYS: [&str; 10] = [
    "w", "width", "widths", "format", "f", "inline", "base64", "raw", "quality", "effort",
];

pub fn is_transform_key(key: &str) -> bool {
    TRANSFORM_KEYS.contains(&key.trim())
}

/// Parsed raw config, validated before any source is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPlan {
    pub widths: Vec<TargetWidth>,
    /// `None` means "same as the source".
    pub format: Option<ImageFormat>,
    pub mode: OutputMode,
    pub encoder: EncoderOptions,
}

impl RequestPlan {
    /// Parse and validate raw query pairs.
    ///
    /// `source` is only used in error messages.
    pub fn parse<K, V>(source: &str, raw: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut widths = Vec::new();
        let mut format = None;
        let mut mode = OutputMode::File;
        let mut encoder = EncoderOptions::default();

        for (key, value) in raw {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            match key {
                "w" | "width" | "widths" => parse_widths(value, &mut widths)?,
                "format" | "f" => {
                    let parsed = ImageFormat::from_extension(value)
                        .ok_or_else(|| PipelineError::unsupported(source, value))?;
                    format = Some(parsed);
                }
                "inline" | "base64" if is_enabled(value) => {
                    mode = OutputMode::Inline(InlineEncoding::Base64);
                }
                "raw" if is_enabled(value) => mode = OutputMode::Inline(InlineEncoding::Raw),
                "inline" | "base64" | "raw" => {}
                "" => {}
                _ => encoder.insert(key, value),
            }
        }

        if widths.is_empty() {
            widths.push(TargetWidth::Native);
        }
        dedup_in_order(&mut widths);

        if mode.is_inline() && widths.len() != 1 {
            return Err(PipelineError::invalid(format!(
                "cannot use base64, raw or inline with {} widths for `{source}`",
                widths.len()
            )));
        }

        Ok(Self {
            widths,
            format,
            mode,
            encoder,
        })
    }

    /// Expand into one request per width, resolving `native` widths and
    /// the default format against the loaded source.
    pub fn into_requests(
        self,
        source: &SourceRef,
        source_format: ImageFormat,
        native_width: u32,
    ) -> Vec<TransformRequest> {
        let format = self.format.unwrap_or(source_format);
        let mut seen = Vec::with_capacity(self.widths.len());

        self.widths
            .into_iter()
            .filter(|w| {
                let px = w.resolve(native_width);
                if seen.contains(&px) {
                    return false;
                }
                seen.push(px);
                true
            })
            .map(|width| TransformRequest {
                source: source.clone(),
                width,
                format,
                mode: self.mode,
                encoder: self.encoder.clone(),
            })
            .collect()
    }
}

fn parse_widths(value: &str, widths: &mut Vec<TargetWidth>) -> Result<()> {
    let mut any = false;
    for part in value.split([';', ',', ' ']).filter(|p| !p.is_empty()) {
        any = true;
        if part.eq_ignore_ascii_case("native") {
            widths.push(TargetWidth::Native);
            continue;
        }
        let px = part
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                PipelineError::invalid(format!("width `{part}` is not a positive integer"))
            })?;
        widths.push(TargetWidth::Pixels(px));
    }
    if !any {
        return Err(PipelineError::invalid("width parameter is empty"));
    }
    Ok(())
}

/// Flags may be bare (`?inline`) or explicit (`?inline=true`).
fn is_enabled(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

fn dedup_in_order(widths: &mut Vec<TargetWidth>) {
    let mut seen = Vec::with_capacity(widths.len());
    widths.retain(|w| {
        if seen.contains(w) {
            false
        } else {
            seen.push(*w);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(n: u32) -> TargetWidth {
        TargetWidth::Pixels(NonZeroU32::new(n).unwrap())
    }

    fn parse(pairs: &[(&str, &str)]) -> Result<RequestPlan> {
        RequestPlan::parse("hero.png", pairs)
    }

    #[test]
    fn test_parse_width_list() {
        let plan = parse(&[("w", "320;640"), ("format", "webp")]).unwrap();
        assert_eq!(plan.widths, vec![px(320), px(640)]);
        assert_eq!(plan.format, Some(ImageFormat::Webp));
        assert_eq!(plan.mode, OutputMode::File);
    }

    #[test]
    fn test_parse_defaults_to_native() {
        let plan = parse(&[]).unwrap();
        assert_eq!(plan.widths, vec![TargetWidth::Native]);
        assert_eq!(plan.format, None);
    }

    #[test]
    fn test_parse_dedups_widths() {
        let plan = parse(&[("w", "320,320"), ("width", "640")]).unwrap();
        assert_eq!(plan.widths, vec![px(320), px(640)]);
    }

    #[test]
    fn test_parse_encoder_options() {
        let plan = parse(&[("quality", "70"), ("effort", "20")]).unwrap();
        assert_eq!(plan.encoder.quality(), Some(70));
        assert_eq!(plan.encoder.effort(), Some(10));
    }

    #[test]
    fn test_inline_with_two_widths_is_invalid() {
        let err = parse(&[("inline", ""), ("w", "320;640")]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_inline_single_width() {
        let plan = parse(&[("base64", ""), ("w", "48")]).unwrap();
        assert_eq!(plan.mode, OutputMode::Inline(InlineEncoding::Base64));

        let plan = parse(&[("raw", "true")]).unwrap();
        assert_eq!(plan.mode, OutputMode::Inline(InlineEncoding::Raw));

        let plan = parse(&[("inline", "false"), ("w", "1;2")]).unwrap();
        assert_eq!(plan.mode, OutputMode::File);
    }

    #[test]
    fn test_invalid_widths() {
        for bad in ["0", "abc", "-5", ""] {
            let err = parse(&[("w", bad)]).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidConfig(_)), "{bad}");
        }
    }

    #[test]
    fn test_unsupported_format() {
        let err = parse(&[("format", "bmp")]).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_into_requests_resolves_native() {
        let source = SourceRef::parse("hero.png").unwrap();
        let plan = parse(&[("w", "native;800")]).unwrap();
        let requests = plan.into_requests(&source, ImageFormat::Png, 800);

        // native == 800, collapses into one
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].width.resolve(800), 800);
        assert_eq!(requests[0].format, ImageFormat::Png);
    }
}
