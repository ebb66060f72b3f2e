//! Default backend: `image` for decode/resize/PNG/JPEG/WebP, `ravif` for AVIF.
//!
//! Decoding, resizing and encoding are CPU-bound and run on tokio's blocking
//! pool. Every variant is encoded inside `transform`, so an encoder error is
//! a `TransformFailed` for its key. Inline variants come back as a buffer,
//! file variants as a stream over the encoded bytes.

use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use super::{ImageBackend, LoadedSource, Payload, Rendered, StreamSource, TransformOptions};
use crate::asset::{EncoderOptions, OutputMode};
use crate::core::ImageFormat;
use crate::error::{PipelineError, Result};

/// Default JPEG/AVIF quality when the request does not set one.
const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBackend;

impl RasterBackend {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageBackend for RasterBackend {
    async fn load(&self, path: &Path) -> Result<LoadedSource> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode(&owned))
            .await
            .map_err(|e| PipelineError::unavailable(path.display().to_string(), e))?
    }

    async fn transform(
        &self,
        source: Arc<LoadedSource>,
        options: TransformOptions,
    ) -> Result<Rendered> {
        let label = source.path.display().to_string();
        tokio::task::spawn_blocking(move || render(&source, options))
            .await
            .map_err(|e| PipelineError::transform(label, e))?
    }
}

fn decode(path: &Path) -> Result<LoadedSource> {
    let label = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| PipelineError::unavailable(&label, e))?;

    let sniffed = image::guess_format(&bytes).ok();
    let format = sniffed
        .and_then(ImageFormat::from_image_format)
        .or_else(|| ImageFormat::from_path(path))
        .ok_or_else(|| {
            let name = sniffed.map_or_else(|| "unknown".to_string(), |f| format!("{f:?}"));
            PipelineError::unsupported(&label, name)
        })?;

    let image = match sniffed {
        Some(f) => image::load_from_memory_with_format(&bytes, f),
        None => image::load_from_memory(&bytes),
    }
    .map_err(|e| PipelineError::unavailable(&label, e))?;

    Ok(LoadedSource::new(
        path,
        format,
        image.width(),
        image.height(),
        Arc::new(image),
    ))
}

fn render(source: &LoadedSource, options: TransformOptions) -> Result<Rendered> {
    let label = source.path.display().to_string();
    let image = source
        .handle::<DynamicImage>()
        .ok_or_else(|| PipelineError::transform(&label, "source was not decoded by this backend"))?;

    let resized = resize(image, options.width);
    let mime = options.format.mime().to_string();

    let bytes: Arc<[u8]> = encode(&resized, options.format, &options.encoder)
        .map_err(|e| PipelineError::transform(&label, e))?
        .into();
    let payload = match options.mode {
        OutputMode::Inline(_) => Payload::Buffer(bytes),
        OutputMode::File => Payload::Stream(Arc::new(Encoded(bytes))),
    };

    Ok(Rendered { mime, payload })
}

/// Scale to `width`, keeping the aspect ratio. Never upscales.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resize(image: &DynamicImage, width: u32) -> DynamicImage {
    let (native_w, native_h) = (image.width(), image.height());
    let target_w = width.min(native_w).max(1);
    if target_w == native_w {
        return image.clone();
    }
    let ratio = f64::from(target_w) / f64::from(native_w);
    let target_h = ((f64::from(native_h) * ratio).round() as u32).max(1);
    image.resize_exact(target_w, target_h, FilterType::Lanczos3)
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    options: &EncoderOptions,
) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::new();
    match format {
        ImageFormat::Png => image
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| e.to_string())?,
        ImageFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::WebP)
            .map_err(|e| e.to_string())?,
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = image.to_rgb8();
            let quality = options.quality().unwrap_or(DEFAULT_QUALITY);
            JpegEncoder::new_with_quality(&mut out, quality)
                .encode_image(&rgb)
                .map_err(|e| e.to_string())?;
        }
        ImageFormat::Avif => out = encode_avif(image, options)?,
    }
    Ok(out)
}

fn encode_avif(image: &DynamicImage, options: &EncoderOptions) -> std::result::Result<Vec<u8>, String> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<ravif::RGBA8> = rgba
        .pixels()
        .map(|p| ravif::RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut encoder = ravif::Encoder::new()
        .with_quality(f32::from(options.quality().unwrap_or(DEFAULT_QUALITY)));
    if let Some(effort) = options.effort() {
        // ravif speed: 1 = slowest/best, 10 = fastest
        encoder = encoder.with_speed((10 - effort).max(1));
    }

    let encoded = encoder
        .encode_rgba(ravif::Img::new(
            pixels.as_slice(),
            width as usize,
            height as usize,
        ))
        .map_err(|e| e.to_string())?;
    Ok(encoded.avif_file)
}

/// Encoded file variant; every `open` starts a fresh reader.
struct Encoded(Arc<[u8]>);

impl StreamSource for Encoded {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.0))))
    }
}
