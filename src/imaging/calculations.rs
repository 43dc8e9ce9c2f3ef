//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropRegion;

/// Round a fractional canvas dimension to a valid buffer dimension.
///
/// Buffers are never zero-sized, so anything that rounds below one becomes one.
pub fn render_dimension(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    value.round().min(f64::from(u32::MAX)) as u32
}

/// Recompute the locked counterpart when one resize dimension is edited.
///
/// The ratio always comes from the bitmap's natural size, never from the
/// values currently in the form, so repeated edits cannot drift.
///
/// # Arguments
/// * `edited` - The new value of the dimension the user changed
/// * `original_edited` - Natural size along the edited axis
/// * `original_other` - Natural size along the other axis
///
/// # Examples
/// ```
/// # use chitram::imaging::locked_dimension;
/// // 1000x500 natural, width edited to 300 → height 150
/// assert_eq!(locked_dimension(300, 1000, 500), 150);
/// // same bitmap, height edited to 120 → width 240
/// assert_eq!(locked_dimension(120, 500, 1000), 240);
/// ```
pub fn locked_dimension(edited: u32, original_edited: u32, original_other: u32) -> u32 {
    if original_edited == 0 {
        return edited;
    }
    let ratio = f64::from(original_other) / f64::from(original_edited);
    (f64::from(edited) * ratio).round() as u32
}

/// Largest canvas any tool allocates, in pixels: 512 MiB of RGBA, the same
/// ceiling `image` puts on decoder allocations by default.
pub const MAX_CANVAS_PIXELS: u64 = 1 << 27;

/// Whether a `width × height` RGBA canvas stays within [`MAX_CANVAS_PIXELS`].
pub fn fits_pixel_budget(width: u32, height: u32) -> bool {
    u64::from(width) * u64::from(height) <= MAX_CANVAS_PIXELS
}

/// Canvas size for an integer upscale. `None` if it would overflow.
pub fn upscaled_dimensions(natural: (u32, u32), factor: u32) -> Option<(u32, u32)> {
    Some((natural.0.checked_mul(factor)?, natural.1.checked_mul(factor)?))
}

/// Absolute pixel anchor for a watermark positioned in percent of the canvas.
pub fn watermark_anchor(canvas: (u32, u32), x_percent: f32, y_percent: f32) -> (f32, f32) {
    (
        canvas.0 as f32 * x_percent / 100.0,
        canvas.1 as f32 * y_percent / 100.0,
    )
}

/// Left edge of a text run of `run_width` centered on `anchor_x`.
pub fn centered_origin(anchor_x: f32, run_width: f32) -> f32 {
    anchor_x - run_width / 2.0
}

/// Largest region of the given aspect ratio, centered within `bounds`.
///
/// `None` aspect means the whole image.
pub fn fit_aspect_region(bounds: (u32, u32), aspect: Option<(u32, u32)>) -> CropRegion {
    let (bw, bh) = bounds;
    let Some((aw, ah)) = aspect.filter(|(w, h)| *w > 0 && *h > 0) else {
        return CropRegion::new(0, 0, bw, bh);
    };

    // Compare bw/bh against aw/ah without floating point.
    let (w, h) = if u64::from(bw) * u64::from(ah) > u64::from(bh) * u64::from(aw) {
        // Bounds are wider than the ratio: full height, trimmed width
        let w = (f64::from(bh) * f64::from(aw) / f64::from(ah)).round() as u32;
        (w.clamp(1, bw.max(1)), bh)
    } else {
        // Bounds are taller: full width, trimmed height
        let h = (f64::from(bw) * f64::from(ah) / f64::from(aw)).round() as u32;
        (bw, h.clamp(1, bh.max(1)))
    };

    CropRegion::new((bw - w) / 2, (bh - h) / 2, w, h)
}

/// Shrink `region` along its longer relative side until it matches `aspect`.
///
/// The origin stays fixed; only width or height is reduced.
pub fn constrain_to_aspect(region: CropRegion, aspect: (u32, u32)) -> CropRegion {
    let (aw, ah) = aspect;
    if aw == 0 || ah == 0 || region.width == 0 || region.height == 0 {
        return region;
    }
    let wide = u64::from(region.width) * u64::from(ah) > u64::from(region.height) * u64::from(aw);
    if wide {
        let w = (f64::from(region.height) * f64::from(aw) / f64::from(ah)).round() as u32;
        CropRegion {
            width: w.max(1),
            ..region
        }
    } else {
        let h = (f64::from(region.width) * f64::from(ah) / f64::from(aw)).round() as u32;
        CropRegion {
            height: h.max(1),
            ..region
        }
    }
}

/// Clip `region` to `bounds`. Returns `None` if nothing remains.
pub fn clamp_region(region: CropRegion, bounds: (u32, u32)) -> Option<CropRegion> {
    let (bw, bh) = bounds;
    if region.x >= bw || region.y >= bh {
        return None;
    }
    let width = region.width.min(bw - region.x);
    let height = region.height.min(bh - region.y);
    (width > 0 && height > 0).then_some(CropRegion {
        width,
        height,
        ..region
    })
}
