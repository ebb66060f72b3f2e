//! Image backend seam.
//!
//! The pipeline never touches pixels itself. It loads a source once through
//! [`ImageBackend::load`] and asks for each variant through
//! [`ImageBackend::transform`]. [`RasterBackend`] is the default
//! implementation on top of the `image` and `ravif` crates.

mod raster;

pub use raster::RasterBackend;

use std::any::Any;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::asset::{EncoderOptions, OutputMode};
use crate::core::ImageFormat;
use crate::error::Result;

/// Lazily produced byte stream (e.g. an encoder that runs on first read).
pub trait StreamSource: Send + Sync {
    /// Open a fresh reader over the encoded bytes.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Encoded bytes of a variant: owned up front or produced on demand.
#[derive(Clone)]
pub enum Payload {
    Buffer(Arc<[u8]>),
    Stream(Arc<dyn StreamSource>),
}

impl Payload {
    pub fn buffer(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Buffer(bytes.into())
    }

    /// Reader over the payload. Each call starts from the beginning.
    pub fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Buffer(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            Self::Stream(source) => source.open(),
        }
    }

    /// Length when known without reading.
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            Self::Buffer(bytes) => Some(bytes.len()),
            Self::Stream(_) => None,
        }
    }

    /// Materialize into bytes. Blocking for stream payloads.
    pub fn to_bytes(&self) -> io::Result<Arc<[u8]>> {
        match self {
            Self::Buffer(bytes) => Ok(Arc::clone(bytes)),
            Self::Stream(source) => {
                let mut out = Vec::new();
                source.open()?.read_to_end(&mut out)?;
                Ok(out.into())
            }
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A decoded source, shared by every variant derived from it.
pub struct LoadedSource {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub native_width: u32,
    pub native_height: u32,
    handle: Arc<dyn Any + Send + Sync>,
}

impl LoadedSource {
    pub fn new(
        path: impl Into<PathBuf>,
        format: ImageFormat,
        native_width: u32,
        native_height: u32,
        handle: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            native_width,
            native_height,
            handle,
        }
    }

    /// Backend-specific decoded image.
    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }
}

impl fmt::Debug for LoadedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedSource")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("native_width", &self.native_width)
            .field("native_height", &self.native_height)
            .finish_non_exhaustive()
    }
}

/// Parameters for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub width: u32,
    pub format: ImageFormat,
    pub mode: OutputMode,
    pub encoder: EncoderOptions,
}

/// Backend output.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub mime: String,
    pub payload: Payload,
}

/// External resize/encode capability.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Decode a local file. Failures are `SourceUnavailable`.
    async fn load(&self, path: &Path) -> Result<LoadedSource>;

    /// Produce one variant. Failures are `TransformFailed`.
    async fn transform(
        &self,
        source: Arc<LoadedSource>,
        options: TransformOptions,
    ) -> Result<Rendered>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repeat(&'static [u8]);

    impl StreamSource for Repeat {
        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(self.0)))
        }
    }

    #[test]
    fn test_payload_buffer_reader_restarts() {
        let payload = Payload::buffer(b"abc".to_vec());
        for _ in 0..2 {
            let mut out = String::new();
            payload.reader().unwrap().read_to_string(&mut out).unwrap();
            assert_eq!(out, "abc");
        }
        assert_eq!(payload.len_hint(), Some(3));
    }

    #[test]
    fn test_payload_stream_materializes() {
        let payload = Payload::Stream(Arc::new(Repeat(b"lazy")));
        assert_eq!(payload.len_hint(), None);
        assert_eq!(&*payload.to_bytes().unwrap(), b"lazy");
    }

    #[test]
    fn test_loaded_source_handle_downcast() {
        let source = LoadedSource::new("/a.png", ImageFormat::Png, 4, 2, Arc::new(42u32));
        assert_eq!(source.handle::<u32>(), Some(&42));
        assert!(source.handle::<String>().is_none());
    }
}
