//! The six tools as data.
//!
//! A [`ToolRequest`] is one fully-specified action: which tool, with which
//! settings. [`render`] and [`run`] are pure functions of a bitmap and a
//! request, so every tool can be exercised without a session or a UI.
//! Compression is the only tool with internal retry state; it is delegated
//! to [`CompressionConverger`].

use crate::imaging::{
    Bitmap, CompressionConverger, ConvergencePolicy, CropRegion, EncodeResult, GlyphRasterizer,
    ImageBackend, ImagingError, OutputFormat, Quality, RenderSurface, WatermarkSpec, transforms,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Compress,
    Crop,
    Resize,
    Convert,
    Upscale,
    Watermark,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Self::Compress,
        Self::Crop,
        Self::Resize,
        Self::Convert,
        Self::Upscale,
        Self::Watermark,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Crop => "crop",
            Self::Resize => "resize",
            Self::Convert => "convert",
            Self::Upscale => "upscale",
            Self::Watermark => "watermark",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One tool action with its settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Compress {
        format: OutputFormat,
        /// `None` or `Some(0)`: no size constraint.
        target_kb: Option<u32>,
        policy: ConvergencePolicy,
    },
    Crop {
        region: CropRegion,
        format: OutputFormat,
    },
    Resize {
        width: u32,
        height: u32,
        format: OutputFormat,
    },
    Convert {
        format: OutputFormat,
        quality: Quality,
    },
    Upscale {
        factor: u32,
        format: OutputFormat,
    },
    Watermark {
        spec: WatermarkSpec,
    },
}

impl ToolRequest {
    pub fn tool(&self) -> Tool {
        match self {
            Self::Compress { .. } => Tool::Compress,
            Self::Crop { .. } => Tool::Crop,
            Self::Resize { .. } => Tool::Resize,
            Self::Convert { .. } => Tool::Convert,
            Self::Upscale { .. } => Tool::Upscale,
            Self::Watermark { .. } => Tool::Watermark,
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Compress { format, .. }
            | Self::Crop { format, .. }
            | Self::Resize { format, .. }
            | Self::Convert { format, .. }
            | Self::Upscale { format, .. } => *format,
            Self::Watermark { .. } => OutputFormat::Jpeg,
        }
    }

    /// Encode quality for a single-shot export.
    pub fn quality(&self) -> Quality {
        match self {
            Self::Compress { policy, .. } => Quality::new(policy.initial_quality),
            Self::Convert { quality, .. } => *quality,
            _ => Quality::HOST_DEFAULT,
        }
    }

    /// Default download name, e.g. `compressed.jpeg` or `upscaled_x3.png`.
    pub fn filename(&self) -> String {
        let ext = self.format().extension();
        match self {
            Self::Compress { .. } => format!("compressed.{ext}"),
            Self::Crop { .. } => format!("cropped.{ext}"),
            Self::Resize { .. } => format!("resized.{ext}"),
            Self::Convert { .. } => format!("converted.{ext}"),
            Self::Upscale { factor, .. } => format!("upscaled_x{factor}.{ext}"),
            Self::Watermark { .. } => "watermarked.jpg".to_string(),
        }
    }
}

/// What the compressor did, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressReport {
    pub target_kb: Option<u32>,
    pub attempts: u32,
    pub final_quality: f64,
    pub target_met: bool,
}

/// Encoded output of one tool action.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: EncodeResult,
    pub compress: Option<CompressReport>,
}

/// Render the request's surface. For compress this is the unconstrained
/// first pass.
pub fn render(
    bitmap: &Bitmap,
    request: &ToolRequest,
    glyphs: Option<&dyn GlyphRasterizer>,
) -> Result<RenderSurface, ImagingError> {
    match request {
        ToolRequest::Compress { .. } | ToolRequest::Convert { .. } => {
            Ok(transforms::convert(bitmap))
        }
        ToolRequest::Crop { region, .. } => transforms::crop(bitmap, *region),
        ToolRequest::Resize { width, height, .. } => transforms::resize(bitmap, *width, *height),
        ToolRequest::Upscale { factor, .. } => transforms::upscale(bitmap, *factor),
        ToolRequest::Watermark { spec } => {
            let mut surface = RenderSurface::new(bitmap.width(), bitmap.height());
            transforms::compose_watermark(&mut surface, bitmap, spec, glyphs)?;
            Ok(surface)
        }
    }
}

/// Render and encode the request.
pub fn run(
    bitmap: &Bitmap,
    request: &ToolRequest,
    backend: &impl ImageBackend,
    glyphs: Option<&dyn GlyphRasterizer>,
) -> Result<ToolOutput, ImagingError> {
    if let ToolRequest::Compress {
        format,
        target_kb,
        policy,
    } = request
    {
        let convergence = CompressionConverger::with_policy(backend, *policy)
            .converge(bitmap, *format, *target_kb)?;
        return Ok(ToolOutput {
            compress: Some(CompressReport {
                target_kb: target_kb.filter(|kb| *kb > 0),
                attempts: convergence.attempts(),
                final_quality: convergence.quality,
                target_met: convergence.target_met,
            }),
            result: convergence.result,
        });
    }

    let surface = render(bitmap, request, glyphs)?;
    let result = surface.encode(backend, request.format(), request.quality())?;
    Ok(ToolOutput {
        result,
        compress: None,
    })
}
