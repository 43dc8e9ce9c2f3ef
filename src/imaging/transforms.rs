//! Per-tool pixel operations.
//!
//! Each function takes a decoded [`Bitmap`] plus its tool settings and
//! returns a freshly configured [`RenderSurface`] ready to encode. None of
//! them touch the codec.

use super::backend::ImagingError;
use super::bitmap::Bitmap;
use super::calculations::{
    MAX_CANVAS_PIXELS, fits_pixel_budget, upscaled_dimensions, watermark_anchor,
};
use super::glyphs::GlyphRasterizer;
use super::params::{CropRegion, Smoothing, WatermarkSpec};
use super::surface::RenderSurface;

/// Refuse canvases too large to allocate before any buffer exists.
fn check_canvas(width: u32, height: u32) -> Result<(), ImagingError> {
    if fits_pixel_budget(width, height) {
        Ok(())
    } else {
        Err(ImagingError::Geometry(format!(
            "{width}x{height} canvas exceeds the {MAX_CANVAS_PIXELS} pixel limit"
        )))
    }
}

/// Extract `region` unscaled.
pub fn crop(bitmap: &Bitmap, region: CropRegion) -> Result<RenderSurface, ImagingError> {
    let mut surface = RenderSurface::new(region.width, region.height);
    surface.draw_region(bitmap, region)?;
    Ok(surface)
}

/// Stretch to exactly `width × height`. Anisotropic scaling is allowed.
pub fn resize(bitmap: &Bitmap, width: u32, height: u32) -> Result<RenderSurface, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::Geometry(format!(
            "resize target {width}x{height} must be positive"
        )));
    }
    check_canvas(width, height)?;
    let mut surface = RenderSurface::new(width, height);
    surface.draw_image(bitmap, width, height, Smoothing::Default);
    Ok(surface)
}

/// Full image at natural size; only the output format changes.
pub fn convert(bitmap: &Bitmap) -> RenderSurface {
    let (w, h) = bitmap.dimensions();
    let mut surface = RenderSurface::new(w, h);
    surface.draw_image(bitmap, w, h, Smoothing::Default);
    surface
}

/// Magnify by an integer factor with high-quality smoothing.
pub fn upscale(bitmap: &Bitmap, factor: u32) -> Result<RenderSurface, ImagingError> {
    if factor == 0 {
        return Err(ImagingError::Geometry(
            "upscale factor must be at least 1".into(),
        ));
    }
    let (w, h) = upscaled_dimensions(bitmap.dimensions(), factor).ok_or_else(|| {
        ImagingError::Geometry(format!(
            "{}x{} upscaled x{factor} overflows",
            bitmap.width(),
            bitmap.height()
        ))
    })?;
    check_canvas(w, h)?;
    let mut surface = RenderSurface::new(w, h);
    surface.draw_image(bitmap, w, h, Smoothing::High);
    Ok(surface)
}

/// Re-render `surface` as the bitmap at natural size with `spec` on top.
///
/// Text is drawn only when non-empty; an empty spec yields the bare image,
/// and in that case `glyphs` is never consulted.
pub fn compose_watermark(
    surface: &mut RenderSurface,
    bitmap: &Bitmap,
    spec: &WatermarkSpec,
    glyphs: Option<&dyn GlyphRasterizer>,
) -> Result<(), ImagingError> {
    let (w, h) = bitmap.dimensions();
    surface.configure(w, h);
    surface.clear();
    surface.draw_image(bitmap, w, h, Smoothing::Default);

    if spec.text.is_empty() {
        return Ok(());
    }
    let glyphs = glyphs.ok_or_else(|| {
        ImagingError::Font("watermark text needs a font; none was loaded".into())
    })?;
    let (x, y) = watermark_anchor(surface.dimensions(), spec.x_percent, spec.y_percent);
    surface.draw_text(&spec.text, x, y, spec.font_size_px, spec.color, glyphs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::bitmap::tests::gradient;
    use crate::imaging::{BlockGlyphs, Color};

    #[test]
    fn crop_output_is_region_size() {
        let surface = crop(&gradient(200, 100), CropRegion::new(20, 10, 50, 40)).unwrap();
        assert_eq!(surface.dimensions(), (50, 40));
    }

    #[test]
    fn crop_outside_errors() {
        assert!(crop(&gradient(20, 20), CropRegion::new(15, 15, 10, 10)).is_err());
    }

    #[test]
    fn resize_is_exact_and_anisotropic() {
        let surface = resize(&gradient(100, 100), 300, 50).unwrap();
        assert_eq!(surface.dimensions(), (300, 50));
        assert_eq!(surface.smoothing(), Some(Smoothing::Default));
    }

    #[test]
    fn resize_rejects_zero() {
        let err = resize(&gradient(10, 10), 0, 10).unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(_)));
    }

    #[test]
    fn convert_keeps_pixels() {
        let bitmap = gradient(30, 20);
        let surface = convert(&bitmap);
        assert_eq!(surface.pixels(), bitmap.pixels());
    }

    #[test]
    fn upscale_x3_is_exact_with_high_smoothing() {
        let surface = upscale(&gradient(100, 100), 3).unwrap();
        assert_eq!(surface.dimensions(), (300, 300));
        assert_eq!(surface.smoothing(), Some(Smoothing::High));
    }

    #[test]
    fn upscale_rejects_zero_factor() {
        assert!(upscale(&gradient(10, 10), 0).is_err());
    }

    #[test]
    fn upscale_beyond_pixel_limit_errors_before_allocating() {
        // 100000x100000 would be a 40 GB buffer
        let err = upscale(&gradient(100, 100), 1000).unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(ref m) if m.contains("100000x100000")));
    }

    #[test]
    fn resize_beyond_pixel_limit_errors() {
        let err = resize(&gradient(10, 10), 100_000, 100_000).unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(_)));
        assert!(resize(&gradient(10, 10), 16_384, 8_193).is_err());
    }

    #[test]
    fn empty_watermark_is_bare_image_without_font() {
        let bitmap = gradient(40, 30);
        let mut surface = RenderSurface::new(1, 1);
        compose_watermark(&mut surface, &bitmap, &WatermarkSpec::default(), None).unwrap();
        assert_eq!(surface.pixels(), bitmap.pixels());
    }

    #[test]
    fn text_watermark_needs_glyphs() {
        let spec = WatermarkSpec::new("SAMPLE", 20, Color::WHITE, 50.0, 50.0);
        let mut surface = RenderSurface::new(1, 1);
        let err = compose_watermark(&mut surface, &gradient(40, 30), &spec, None).unwrap_err();
        assert!(matches!(err, ImagingError::Font(_)));
    }

    #[test]
    fn watermark_sample_lands_at_anchor() {
        // 400x300, x=50%, y=90% → baseline at (200, 270), centered
        let bitmap = Bitmap::from_pixels(image::DynamicImage::ImageRgba8(
            image::RgbaImage::from_pixel(400, 300, image::Rgba([0, 0, 0, 255])),
        ));
        let spec = WatermarkSpec::new("SAMPLE", 20, Color::WHITE, 50.0, 90.0);
        let mut surface = RenderSurface::new(1, 1);
        compose_watermark(&mut surface, &bitmap, &spec, Some(&BlockGlyphs)).unwrap();

        assert_eq!(surface.dimensions(), (400, 300));
        let painted: Vec<(u32, u32)> = surface
            .pixels()
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = painted.iter().map(|p| p.0).min().unwrap();
        let max_y = painted.iter().map(|p| p.1).max().unwrap();
        // Run is 84px wide (see BlockGlyphs), last glyph has no trailing gap
        assert_eq!(min_x, 158);
        assert_eq!(max_y, 269);
    }

    #[test]
    fn watermark_rerender_is_idempotent() {
        let bitmap = gradient(64, 48);
        let spec = WatermarkSpec::new("Hi", 12, Color::WHITE, 25.0, 75.0);
        let mut a = RenderSurface::new(1, 1);
        let mut b = RenderSurface::new(1, 1);
        compose_watermark(&mut a, &bitmap, &spec, Some(&BlockGlyphs)).unwrap();
        compose_watermark(&mut b, &bitmap, &spec, Some(&BlockGlyphs)).unwrap();
        compose_watermark(&mut b, &bitmap, &spec, Some(&BlockGlyphs)).unwrap();
        assert_eq!(a.pixels(), b.pixels());
    }
}
