//! Image processing: decode, draw, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (format sniffed from bytes) |
//! | **Resize / upscale** | `image::imageops::resize`, Triangle / Lanczos3 |
//! | **Text** | `fontdue` rasterizer, alpha-blended onto the surface |
//! | **Encode** | `image` codecs: JPEG, PNG, WebP (lossless), AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: pure dimension and geometry math (unit testable)
//! - **Parameters**: value types describing an encode, a crop, a watermark
//! - **Surface**: [`RenderSurface`], the one drawing buffer every tool uses
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Transforms**: per-tool pixel work producing a configured surface
//! - **Converge**: [`CompressionConverger`], the size-targeting encode loop

pub mod backend;
pub mod bitmap;
mod calculations;
pub mod converge;
mod format;
pub mod glyphs;
mod params;
pub mod rust_backend;
pub mod selection;
mod surface;
pub mod transforms;

pub use backend::{EncodeResult, ImageBackend, ImagingError};
pub use bitmap::{Bitmap, Upload, is_supported_input, supported_input_extensions};
pub use calculations::{locked_dimension, render_dimension, upscaled_dimensions};
pub use converge::{CompressionConverger, Convergence, ConvergencePolicy, ConvergenceState};
pub use format::OutputFormat;
pub use glyphs::{BlockGlyphs, FontdueGlyphs, GlyphRasterizer};
pub use params::{Color, CropRegion, EncodeRequest, ParamError, Quality, Smoothing, WatermarkSpec};
pub use rust_backend::RustBackend;
pub use selection::{AspectPreset, CropSelector};
pub use surface::RenderSurface;
