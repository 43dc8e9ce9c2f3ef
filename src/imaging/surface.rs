//! Off-screen raster canvas.
//!
//! A [`RenderSurface`] is an RGBA buffer with the handful of drawing
//! operations every tool needs. Resizing the buffer discards its pixels, so
//! callers re-draw after every [`configure`](RenderSurface::configure).
//!
//! | Operation | Implementation |
//! |---|---|
//! | Scaled draw | `imageops::resize` (Triangle or Lanczos3), then source-over |
//! | Region draw | `imageops::crop_imm`, then source-over |
//! | Text | [`GlyphRasterizer`] coverage masks, alpha-blended per pixel |
//! | Encode | delegated to an [`ImageBackend`] |

use super::backend::{EncodeResult, ImageBackend, ImagingError};
use super::bitmap::Bitmap;
use super::calculations::centered_origin;
use super::format::OutputFormat;
use super::glyphs::GlyphRasterizer;
use super::params::{Color, CropRegion, EncodeRequest, Quality, Smoothing};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RenderSurface {
    buffer: RgbaImage,
    /// Smoothing mode of the most recent scaled draw.
    last_smoothing: Option<Smoothing>,
}

impl RenderSurface {
    /// A fresh, transparent surface. Zero dimensions are raised to one.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::new(width.max(1), height.max(1)),
            last_smoothing: None,
        }
    }

    /// Set the buffer size, discarding all pixels.
    pub fn configure(&mut self, width: u32, height: u32) {
        self.buffer = RgbaImage::new(width.max(1), height.max(1));
        self.last_smoothing = None;
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    pub fn smoothing(&self) -> Option<Smoothing> {
        self.last_smoothing
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Draw `bitmap` scaled to fill `dest_width × dest_height` at the origin.
    pub fn draw_image(
        &mut self,
        bitmap: &Bitmap,
        dest_width: u32,
        dest_height: u32,
        smoothing: Smoothing,
    ) {
        let src = bitmap.pixels();
        if (dest_width, dest_height) == src.dimensions() {
            composite(&mut self.buffer, src);
        } else {
            let filter = match smoothing {
                Smoothing::Default => FilterType::Triangle,
                Smoothing::High => FilterType::Lanczos3,
            };
            let scaled = imageops::resize(src, dest_width.max(1), dest_height.max(1), filter);
            composite(&mut self.buffer, &scaled);
        }
        self.last_smoothing = Some(smoothing);
    }

    /// Draw exactly `region` of `bitmap` at the origin, unscaled.
    pub fn draw_region(&mut self, bitmap: &Bitmap, region: CropRegion) -> Result<(), ImagingError> {
        if !region.fits_within(bitmap.dimensions()) {
            return Err(ImagingError::Geometry(format!(
                "region {}x{}+{}+{} outside {}x{} image",
                region.width,
                region.height,
                region.x,
                region.y,
                bitmap.width(),
                bitmap.height()
            )));
        }
        let sub = imageops::crop_imm(
            bitmap.pixels(),
            region.x,
            region.y,
            region.width,
            region.height,
        )
        .to_image();
        composite(&mut self.buffer, &sub);
        Ok(())
    }

    /// Draw `text` horizontally centered on `x_px` with its baseline at `y_px`.
    ///
    /// Returns the left edge the run was drawn from.
    pub fn draw_text(
        &mut self,
        text: &str,
        x_px: f32,
        y_px: f32,
        font_size_px: u32,
        color: Color,
        glyphs: &dyn GlyphRasterizer,
    ) -> f32 {
        let run = glyphs.layout(text, font_size_px as f32);
        let origin_x = centered_origin(x_px, run.advance);
        let baseline = y_px.round() as i64;
        let (w, h) = (i64::from(self.width()), i64::from(self.height()));

        for glyph in &run.glyphs {
            let left = (origin_x + glyph.x).round() as i64;
            let top = baseline + i64::from(glyph.top);
            for row in 0..glyph.height {
                let py = top + row as i64;
                if py < 0 || py >= h {
                    continue;
                }
                for col in 0..glyph.width {
                    let px = left + col as i64;
                    if px < 0 || px >= w {
                        continue;
                    }
                    let coverage = glyph.coverage[row * glyph.width + col];
                    if coverage == 0 {
                        continue;
                    }
                    let dst = self.buffer.get_pixel_mut(px as u32, py as u32);
                    blend_over(dst, color, coverage);
                }
            }
        }
        debug!(text, x_px, y_px, origin_x, advance = run.advance, "drew text");
        origin_x
    }

    /// Serialize the current buffer.
    pub fn encode(
        &self,
        backend: &impl ImageBackend,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<EncodeResult, ImagingError> {
        let request = EncodeRequest {
            width: self.width(),
            height: self.height(),
            quality,
            format,
        };
        backend.encode(&self.buffer, &request)
    }
}

/// Source-over `src` onto `dst` at the origin.
///
/// Opaque source pixels and transparent destination pixels are copied
/// verbatim, so drawing onto a cleared buffer reproduces the source exactly.
fn composite(dst: &mut RgbaImage, src: &RgbaImage) {
    let w = dst.width().min(src.width());
    let h = dst.height().min(src.height());
    for y in 0..h {
        for x in 0..w {
            let s = *src.get_pixel(x, y);
            let d = dst.get_pixel_mut(x, y);
            match (s[3], d[3]) {
                (0, _) => {}
                (255, _) | (_, 0) => *d = s,
                (a, _) => blend_over(
                    d,
                    Color {
                        r: s[0],
                        g: s[1],
                        b: s[2],
                        a,
                    },
                    255,
                ),
            }
        }
    }
}

/// Source-over blend of `color` at `coverage` onto `dst` (straight alpha).
fn blend_over(dst: &mut Rgba<u8>, color: Color, coverage: u8) {
    let sa = f32::from(color.a) / 255.0 * f32::from(coverage) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    let mix = |s: u8, d: u8| -> u8 {
        let v = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(color.r, dst[0]),
        mix(color.g, dst[1]),
        mix(color.b, dst[2]),
        (out_a * 255.0).round() as u8,
    ]);
}
