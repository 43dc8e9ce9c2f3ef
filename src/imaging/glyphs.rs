//! Text rasterization for watermarks.
//!
//! [`GlyphRasterizer`] turns a string into positioned coverage masks; the
//! [`RenderSurface`](super::RenderSurface) does the compositing. Keeping the
//! two apart means the layout math (centering, baseline) is tested with the
//! font-free [`BlockGlyphs`] while production uses real outlines through
//! [`FontdueGlyphs`].

use super::backend::ImagingError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bold sans faces probed when no font file is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// One rasterized glyph, positioned relative to the run origin on the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    /// Left edge, in pixels from the run origin.
    pub x: f32,
    /// Top edge, in pixels from the baseline (negative is above it).
    pub top: i32,
    pub width: usize,
    pub height: usize,
    /// Row-major coverage, `width * height` bytes.
    pub coverage: Vec<u8>,
}

/// A laid-out line of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    pub glyphs: Vec<PlacedGlyph>,
    /// Total pen advance; the width used for centering.
    pub advance: f32,
}

pub trait GlyphRasterizer: Send + Sync {
    /// Lay out `text` on a single line at `px` pixels per em.
    fn layout(&self, text: &str, px: f32) -> TextRun;
}

/// Glyphs from a TrueType/OpenType font via `fontdue`.
pub struct FontdueGlyphs {
    font: fontdue::Font,
    /// Widen strokes for faces that are not bold already.
    embolden: bool,
}

impl FontdueGlyphs {
    pub fn from_bytes(bytes: Vec<u8>, embolden: bool) -> Result<Self, ImagingError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| ImagingError::Font(e.to_string()))?;
        Ok(Self { font, embolden })
    }

    /// Load `path`, or the first bold system face found when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ImagingError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => find_system_font().ok_or_else(|| {
                ImagingError::Font(
                    "no bold system font found; set watermark.font or pass --font".into(),
                )
            })?,
        };
        let bytes = std::fs::read(&path)
            .map_err(|e| ImagingError::Font(format!("{}: {e}", path.display())))?;
        let embolden = !looks_bold(&path);
        debug!(font = %path.display(), embolden, "loaded watermark font");
        Self::from_bytes(bytes, embolden)
    }
}

fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn looks_bold(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| {
            let s = s.to_ascii_lowercase();
            s.contains("bold") || s.ends_with("bd")
        })
}

/// Horizontal max-dilation of a coverage mask by `radius` pixels.
fn dilate(width: usize, height: usize, coverage: &[u8], radius: usize) -> (usize, Vec<u8>) {
    let out_w = width + radius;
    let mut out = vec![0u8; out_w * height];
    for row in 0..height {
        for col in 0..width {
            let v = coverage[row * width + col];
            for dx in 0..=radius {
                let idx = row * out_w + col + dx;
                out[idx] = out[idx].max(v);
            }
        }
    }
    (out_w, out)
}

impl GlyphRasterizer for FontdueGlyphs {
    fn layout(&self, text: &str, px: f32) -> TextRun {
        let radius = if self.embolden {
            ((px / 24.0).round() as usize).max(1)
        } else {
            0
        };
        let mut run = TextRun::default();
        let mut pen = 0.0f32;
        let mut prev: Option<char> = None;

        for ch in text.chars() {
            if let Some(p) = prev {
                pen += self.font.horizontal_kern(p, ch, px).unwrap_or(0.0);
            }
            let (metrics, bitmap) = self.font.rasterize(ch, px);
            let (width, coverage) = if radius > 0 && metrics.width > 0 {
                dilate(metrics.width, metrics.height, &bitmap, radius)
            } else {
                (metrics.width, bitmap)
            };
            if width > 0 && metrics.height > 0 {
                run.glyphs.push(PlacedGlyph {
                    x: pen + metrics.xmin as f32,
                    top: -(metrics.ymin + metrics.height as i32),
                    width,
                    height: metrics.height,
                    coverage,
                });
            }
            pen += metrics.advance_width + radius as f32;
            prev = Some(ch);
        }

        run.advance = pen;
        run
    }
}

/// Font-free rasterizer: every non-space character is a solid box.
///
/// Boxes are `0.6 em` wide with a `0.1 em` gap and `0.7 em` tall, sitting on
/// the baseline. Deterministic everywhere, so it anchors layout tests and
/// previews on machines without fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphs;

impl GlyphRasterizer for BlockGlyphs {
    fn layout(&self, text: &str, px: f32) -> TextRun {
        let glyph_w = (px * 0.6).round().max(1.0) as usize;
        let gap = (px * 0.1).round() as usize;
        let glyph_h = (px * 0.7).round().max(1.0) as usize;
        let step = (glyph_w + gap) as f32;

        let mut run = TextRun::default();
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            run.glyphs.push(PlacedGlyph {
                x: i as f32 * step,
                top: -(glyph_h as i32),
                width: glyph_w,
                height: glyph_h,
                coverage: vec![255; glyph_w * glyph_h],
            });
        }
        run.advance = text.chars().count() as f32 * step;
        run
    }
}
