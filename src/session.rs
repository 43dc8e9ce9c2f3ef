//! Explicit session state.
//!
//! A [`Session`] holds what one user has loaded into each tool, plus the
//! per-tool editing state (crop selection, resize form, watermark preview).
//! It is single-owner: [`Session::export`] takes `&mut self`, so a second
//! export cannot start while one is in flight.
//!
//! ## Lifecycle
//!
//! ```text
//! load ──► edit* ──► export ──► sink Ok ──► reset (empty)
//!                      │
//!                      └── any error ──► state kept, nothing reset
//! ```

use crate::export::{ExportError, ExportReceipt, ExportSink};
use crate::imaging::{
    Bitmap, CropSelector, GlyphRasterizer, ImageBackend, ImagingError, OutputFormat, Quality,
    RenderSurface, Upload, WatermarkSpec, locked_dimension, transforms,
};
use crate::tools::{self, CompressReport, Tool, ToolOutput, ToolRequest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No image loaded for {0}")]
    MissingInput(Tool),
    #[error("Watermark text needs a glyph rasterizer; load a font first")]
    NoGlyphs,
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { width: u32, height: u32 },
    /// Not declared as an image; the tool's slot is untouched.
    Ignored,
}

/// Width/height inputs of the resize tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeForm {
    natural: (u32, u32),
    width: u32,
    height: u32,
    lock_aspect: bool,
}

impl ResizeForm {
    /// Prefilled with the natural size, aspect locked.
    pub fn new(natural: (u32, u32)) -> Self {
        Self {
            natural,
            width: natural.0,
            height: natural.1,
            lock_aspect: true,
        }
    }

    pub fn set_lock(&mut self, lock: bool) {
        self.lock_aspect = lock;
    }

    pub fn is_locked(&self) -> bool {
        self.lock_aspect
    }

    /// With the lock on, the height follows from the natural ratio.
    pub fn edit_width(&mut self, width: u32) {
        self.width = width;
        if self.lock_aspect && self.natural.0 > 0 {
            self.height = locked_dimension(width, self.natural.0, self.natural.1);
        }
    }

    pub fn edit_height(&mut self, height: u32) {
        self.height = height;
        if self.lock_aspect && self.natural.1 > 0 {
            self.width = locked_dimension(height, self.natural.1, self.natural.0);
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Live watermark render; what is shown is what gets exported.
#[derive(Debug, Clone)]
pub struct WatermarkPreview {
    surface: RenderSurface,
    spec: WatermarkSpec,
}

impl WatermarkPreview {
    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn spec(&self) -> &WatermarkSpec {
        &self.spec
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub tool: Tool,
    #[serde(flatten)]
    pub receipt: ExportReceipt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<CompressReport>,
}

#[derive(Default)]
pub struct Session {
    bitmaps: BTreeMap<Tool, Bitmap>,
    crop: Option<CropSelector>,
    resize: Option<ResizeForm>,
    watermark: Option<WatermarkPreview>,
    watermark_spec: WatermarkSpec,
    glyphs: Option<Arc<dyn GlyphRasterizer>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that can draw watermark text. The rasterizer is shared, so
    /// many sessions can reuse one loaded font.
    pub fn with_glyphs(glyphs: Arc<dyn GlyphRasterizer>) -> Self {
        Self {
            glyphs: Some(glyphs),
            ..Self::default()
        }
    }

    /// Decode `upload` into `tool`'s slot, replacing whatever was there.
    pub fn load(&mut self, tool: Tool, upload: &Upload) -> Result<LoadOutcome, SessionError> {
        let Some(bitmap) = Bitmap::from_upload(upload)? else {
            debug!(name = %upload.name, declared = ?upload.declared_type, "not an image, ignored");
            return Ok(LoadOutcome::Ignored);
        };
        let (width, height) = bitmap.dimensions();

        match tool {
            Tool::Crop => self.crop = Some(CropSelector::new((width, height))),
            Tool::Resize => self.resize = Some(ResizeForm::new((width, height))),
            Tool::Watermark => {
                let spec = self.watermark_spec.clone();
                self.watermark = Some(self.compose(&bitmap, spec)?);
            }
            Tool::Compress | Tool::Convert | Tool::Upscale => {}
        }
        self.bitmaps.insert(tool, bitmap);

        info!(%tool, name = %upload.name, width, height, "loaded");
        Ok(LoadOutcome::Loaded { width, height })
    }

    pub fn bitmap(&self, tool: Tool) -> Option<&Bitmap> {
        self.bitmaps.get(&tool)
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
            && self.crop.is_none()
            && self.resize.is_none()
            && self.watermark.is_none()
    }

    pub fn crop_selector_mut(&mut self) -> Option<&mut CropSelector> {
        self.crop.as_mut()
    }

    pub fn resize_form_mut(&mut self) -> Option<&mut ResizeForm> {
        self.resize.as_mut()
    }

    pub fn watermark_preview(&self) -> Option<&WatermarkPreview> {
        self.watermark.as_ref()
    }

    /// Set the watermark and re-render the preview if an image is loaded.
    pub fn update_watermark(&mut self, spec: WatermarkSpec) -> Result<(), SessionError> {
        if let Some(bitmap) = self.bitmaps.get(&Tool::Watermark) {
            self.watermark = Some(self.compose(bitmap, spec.clone())?);
        }
        self.watermark_spec = spec;
        Ok(())
    }

    fn compose(
        &self,
        bitmap: &Bitmap,
        spec: WatermarkSpec,
    ) -> Result<WatermarkPreview, SessionError> {
        if !spec.text.is_empty() && self.glyphs.is_none() {
            return Err(SessionError::NoGlyphs);
        }
        let mut surface = match &self.watermark {
            Some(preview) => preview.surface.clone(),
            None => RenderSurface::new(bitmap.width(), bitmap.height()),
        };
        transforms::compose_watermark(&mut surface, bitmap, &spec, self.glyphs.as_deref())?;
        Ok(WatermarkPreview { surface, spec })
    }

    /// Crop request for the current selection.
    pub fn crop_request(&self, format: OutputFormat) -> Result<ToolRequest, SessionError> {
        let selector = self.crop.as_ref().ok_or(SessionError::MissingInput(Tool::Crop))?;
        Ok(ToolRequest::Crop {
            region: selector.commit(),
            format,
        })
    }

    /// Resize request for the current form values.
    pub fn resize_request(&self, format: OutputFormat) -> Result<ToolRequest, SessionError> {
        let form = self
            .resize
            .as_ref()
            .ok_or(SessionError::MissingInput(Tool::Resize))?;
        let (width, height) = form.dimensions();
        Ok(ToolRequest::Resize {
            width,
            height,
            format,
        })
    }

    /// Watermark request for the spec currently previewed.
    pub fn watermark_request(&self) -> ToolRequest {
        ToolRequest::Watermark {
            spec: self.watermark_spec.clone(),
        }
    }

    /// Render, encode and deliver `request`; reset once the sink accepts it.
    ///
    /// On any error the session is left as it was.
    pub fn export(
        &mut self,
        request: &ToolRequest,
        backend: &impl ImageBackend,
        sink: &mut impl ExportSink,
    ) -> Result<ExportReport, SessionError> {
        let tool = request.tool();
        if !self.bitmaps.contains_key(&tool) {
            return Err(SessionError::MissingInput(tool));
        }

        let output = match request {
            ToolRequest::Watermark { spec } => {
                if self.watermark_spec != *spec || self.watermark.is_none() {
                    self.update_watermark(spec.clone())?;
                }
                let preview = self
                    .watermark
                    .as_ref()
                    .ok_or(SessionError::MissingInput(tool))?;
                ToolOutput {
                    result: preview.surface.encode(
                        backend,
                        OutputFormat::Jpeg,
                        Quality::HOST_DEFAULT,
                    )?,
                    compress: None,
                }
            }
            _ => {
                let bitmap = self
                    .bitmaps
                    .get(&tool)
                    .ok_or(SessionError::MissingInput(tool))?;
                tools::run(bitmap, request, backend, self.glyphs.as_deref())?
            }
        };

        let receipt = sink.deliver(&request.filename(), &output.result)?;
        info!(
            %tool,
            file = %receipt.filename,
            kb = format_args!("{:.2}", output.result.kilobytes()),
            "exported"
        );
        self.reset();

        Ok(ExportReport {
            tool,
            receipt,
            compress: output.compress,
        })
    }

    /// Back to the empty, pre-upload state. The glyph rasterizer is kept.
    pub fn reset(&mut self) {
        self.bitmaps.clear();
        self.crop = None;
        self.resize = None;
        self.watermark = None;
        self.watermark_spec = WatermarkSpec::default();
        debug!("session reset");
    }
}
