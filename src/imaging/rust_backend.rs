//! Pure Rust codec backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Format | Encoder | Quality |
//! |---|---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` | honoured, alpha flattened onto black |
//! | PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter) | ignored |
//! | WebP | `image::codecs::webp::WebPEncoder` (lossless) | ignored |
//! | AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) | honoured |

use super::backend::{EncodeResult, ImageBackend, ImagingError};
use super::format::OutputFormat;
use super::params::EncodeRequest;
use image::codecs::png::{CompressionType, FilterType as PngFilter};
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use tracing::debug;

/// Encoder speed for AVIF: slow enough to compress well, fast enough for a
/// convergence loop of up to thirty encodes.
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate encoders.
///
/// See the [module docs](self) for the format-to-encoder mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop alpha the way a canvas does for JPEG: composite onto opaque black.
fn flatten_onto_black(pixels: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let p = pixels.get_pixel(x, y);
        let a = u16::from(p[3]);
        let f = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        image::Rgb([f(p[0]), f(p[1]), f(p[2])])
    })
}

fn encode_failed(format: OutputFormat) -> impl Fn(image::ImageError) -> ImagingError {
    move |e| ImagingError::Encode(format!("{format}: {e}"))
}

impl ImageBackend for RustBackend {
    fn encode(
        &self,
        pixels: &RgbaImage,
        request: &EncodeRequest,
    ) -> Result<EncodeResult, ImagingError> {
        let (width, height) = pixels.dimensions();
        let format = request.format;
        let mut bytes = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                let rgb = flatten_onto_black(pixels);
                image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut bytes,
                    request.quality.to_percent(),
                )
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(encode_failed(format))?;
            }
            OutputFormat::Png => {
                image::codecs::png::PngEncoder::new_with_quality(
                    &mut bytes,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                )
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encode_failed(format))?;
            }
            OutputFormat::WebP => {
                image::codecs::webp::WebPEncoder::new_lossless(&mut bytes)
                    .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_failed(format))?;
            }
            OutputFormat::Avif => {
                image::codecs::avif::AvifEncoder::new_with_speed_quality(
                    &mut bytes,
                    AVIF_SPEED,
                    request.quality.to_percent(),
                )
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encode_failed(format))?;
            }
        }

        debug!(
            %format,
            width,
            height,
            quality = request.quality.value(),
            bytes = bytes.len(),
            "encoded"
        );
        Ok(EncodeResult {
            bytes,
            format,
            width,
            height,
        })
    }
}
