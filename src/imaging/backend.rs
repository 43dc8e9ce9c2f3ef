//! Codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between pixel work (done on a
//! [`RenderSurface`](super::RenderSurface)) and the host codec that turns a
//! pixel buffer into bytes. Everything above this trait is deterministic
//! pixel math; everything below it may differ between encoder versions.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! recording `MockBackend` in this module, whose output size is a function of
//! the request, so size-seeking logic can be exercised without real encoders.

use super::format::OutputFormat;
use super::params::EncodeRequest;
use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Invalid geometry: {0}")]
    Geometry(String),
    #[error("Font unavailable: {0}")]
    Font(String),
}

/// Encoded bytes plus what they describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodeResult {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodeResult {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn kilobytes(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }
}

/// Trait for codec backends.
///
/// `Sync` so independent sessions can share one backend across a rayon pool.
pub trait ImageBackend: Sync {
    /// Serialize a pixel buffer. `request` carries the buffer's dimensions,
    /// the target format and the quality (ignored for lossless formats).
    fn encode(
        &self,
        pixels: &RgbaImage,
        request: &EncodeRequest,
    ) -> Result<EncodeResult, ImagingError>;
}
