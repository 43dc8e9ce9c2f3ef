//! Running one tool over many inputs.
//!
//! Each input file gets its own [`Session`]: load, apply the tool settings,
//! export, done. Nothing is shared between sessions except the codec backend
//! and the glyph rasterizer, both immutable, so inputs are processed in
//! parallel with [rayon](https://docs.rs/rayon). The pool size comes from
//! `[processing] max_processes`.
//!
//! ## Output names
//!
//! A single input exports under the tool's default name (`compressed.jpeg`).
//! With several inputs each name is prefixed with the input's file stem
//! (`beach-compressed.jpeg`, `city-compressed.jpeg`). Stems that repeat,
//! such as `a/photo.png` and `b/photo.jpg`, get a numeric suffix in input
//! order (`photo-compressed.jpeg`, `photo-2-compressed.jpeg`), compared
//! case-insensitively so case-folding filesystems cannot merge them either.

use crate::export::FileSink;
use crate::imaging::{
    AspectPreset, ConvergencePolicy, CropRegion, GlyphRasterizer, ImageBackend, ImagingError,
    OutputFormat, Quality, Upload, WatermarkSpec, is_supported_input,
};
use crate::session::{ExportReport, LoadOutcome, Session, SessionError};
use crate::tools::{Tool, ToolRequest};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Tool settings as the CLI and config file express them. Unlike a
/// [`ToolRequest`], crop and resize are given relative to an image that has
/// not been loaded yet.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSettings {
    Compress {
        format: OutputFormat,
        target_kb: u32,
        policy: ConvergencePolicy,
    },
    Crop {
        format: OutputFormat,
        aspect: AspectPreset,
        /// Explicit selection; the whole image (fitted to `aspect`) otherwise.
        region: Option<CropRegion>,
    },
    Resize {
        format: OutputFormat,
        width: Option<u32>,
        height: Option<u32>,
        lock_aspect: bool,
    },
    Convert {
        format: OutputFormat,
        quality: Quality,
    },
    Upscale {
        format: OutputFormat,
        factor: u32,
    },
    Watermark {
        spec: WatermarkSpec,
    },
}

impl ToolSettings {
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

    /// Apply the settings to a loaded session and build the export request.
    pub fn request_for(&self, session: &mut Session) -> Result<ToolRequest, BatchError> {
        let request = match self {
            Self::Compress {
                format,
                target_kb,
                policy,
            } => ToolRequest::Compress {
                format: *format,
                target_kb: Some(*target_kb),
                policy: *policy,
            },
            Self::Crop {
                format,
                aspect,
                region,
            } => {
                let selector = session
                    .crop_selector_mut()
                    .ok_or(SessionError::MissingInput(Tool::Crop))?;
                selector.set_aspect(*aspect);
                if let Some(region) = region {
                    if !selector.select(*region) {
                        return Err(ImagingError::Geometry(format!(
                            "crop region {},{},{},{} lies outside the image",
                            region.x, region.y, region.width, region.height
                        ))
                        .into());
                    }
                }
                session.crop_request(*format)?
            }
            Self::Resize {
                format,
                width,
                height,
                lock_aspect,
            } => {
                let form = session
                    .resize_form_mut()
                    .ok_or(SessionError::MissingInput(Tool::Resize))?;
                // Both given means both are meant literally.
                form.set_lock(*lock_aspect && (width.is_none() || height.is_none()));
                if let Some(w) = width {
                    form.edit_width(*w);
                }
                if let Some(h) = height {
                    form.edit_height(*h);
                }
                session.resize_request(*format)?
            }
            Self::Convert { format, quality } => ToolRequest::Convert {
                format: *format,
                quality: *quality,
            },
            Self::Upscale { format, factor } => ToolRequest::Upscale {
                factor: *factor,
                format: *format,
            },
            Self::Watermark { spec } => {
                session.update_watermark(spec.clone())?;
                session.watermark_request()
            }
        };
        Ok(request)
    }
}

/// What happened to one input.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Exported {
        #[serde(flatten)]
        report: ExportReport,
    },
    /// Not an image.
    Skipped,
    Failed {
        error: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl BatchItem {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Expand files and directories into the list of image files to process.
///
/// Files named explicitly are kept whatever their extension (a non-image is
/// skipped later, at load time). Directories are walked recursively for
/// supported image extensions, in file-name order.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, BatchError> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|source| BatchError::Walk {
                    path: path.clone(),
                    source,
                })?;
                if entry.file_type().is_file() && is_supported_input(entry.path()) {
                    inputs.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            inputs.push(path.clone());
        } else {
            return Err(BatchError::NotFound(path.clone()));
        }
    }
    debug!(count = inputs.len(), "collected inputs");
    Ok(inputs)
}

/// One export-name prefix per input, unique across the batch.
///
/// A single input gets no prefix. Otherwise each input gets its file stem,
/// with `-2`, `-3`, ... appended to stems already handed out.
pub fn export_prefixes(inputs: &[PathBuf]) -> Vec<Option<String>> {
    if inputs.len() < 2 {
        return vec![None; inputs.len()];
    }
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "input".to_string());
            let mut prefix = stem.clone();
            let mut n = 2;
            while !taken.insert(prefix.to_lowercase()) {
                prefix = format!("{stem}-{n}");
                n += 1;
            }
            Some(prefix)
        })
        .collect()
}

/// Process a single input in a fresh session, exporting into `output_dir`.
///
/// With a `prefix` the export is named `<prefix>-<default name>`.
pub fn run_one(
    path: &Path,
    settings: &ToolSettings,
    backend: &impl ImageBackend,
    output_dir: &Path,
    prefix: Option<&str>,
    glyphs: Option<Arc<dyn GlyphRasterizer>>,
) -> Result<Option<ExportReport>, BatchError> {
    let upload = Upload::from_path(path)?;
    let mut sink = FileSink::new(output_dir);
    if let Some(prefix) = prefix {
        sink = sink.with_prefix(prefix);
    }
    let mut session = match glyphs {
        Some(glyphs) => Session::with_glyphs(glyphs),
        None => Session::new(),
    };
    if session.load(settings.tool(), &upload)? == LoadOutcome::Ignored {
        return Ok(None);
    }
    let request = settings.request_for(&mut session)?;
    Ok(Some(session.export(&request, backend, &mut sink)?))
}

/// Process every input in parallel, one session each, preserving input order
/// in the returned items.
pub fn run_batch(
    inputs: &[PathBuf],
    settings: &ToolSettings,
    backend: &impl ImageBackend,
    output_dir: &Path,
    glyphs: Option<Arc<dyn GlyphRasterizer>>,
) -> Vec<BatchItem> {
    let prefixes = export_prefixes(inputs);
    inputs
        .par_iter()
        .zip(prefixes.par_iter())
        .map(|(path, prefix)| {
            let outcome = match run_one(
                path,
                settings,
                backend,
                output_dir,
                prefix.as_deref(),
                glyphs.clone(),
            ) {
                Ok(Some(report)) => Outcome::Exported { report },
                Ok(None) => Outcome::Skipped,
                Err(e) => {
                    warn!(source = %path.display(), error = %e, "input failed");
                    Outcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            BatchItem {
                source: path.clone(),
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::bitmap::tests::png_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, png_bytes(w, h)).unwrap();
        path
    }

    fn convert_png() -> ToolSettings {
        ToolSettings::Convert {
            format: OutputFormat::Png,
            quality: Quality::HOST_DEFAULT,
        }
    }

    #[test]
    fn collect_inputs_walks_directories_for_images() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        write_png(tmp.path(), "b.png", 2, 2);
        write_png(&nested, "a.png", 2, 2);
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let inputs = collect_inputs(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.png", "a.png"]);
    }

    #[test]
    fn collect_inputs_keeps_explicit_files() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert_eq!(collect_inputs(&[txt.clone()]).unwrap(), vec![txt]);
    }

    #[test]
    fn collect_inputs_missing_path_errors() {
        let tmp = TempDir::new().unwrap();
        let err = collect_inputs(&[tmp.path().join("nope.png")]).unwrap_err();
        assert!(matches!(err, BatchError::NotFound(_)));
    }

    #[test]
    fn single_input_uses_default_name() {
        let tmp = TempDir::new().unwrap();
        let input = write_png(tmp.path(), "photo.png", 12, 8);
        let out = tmp.path().join("out");

        let items = run_batch(&[input], &convert_png(), &RustBackend::new(), &out, None);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].outcome, Outcome::Exported { .. }));
        assert!(out.join("converted.png").exists());
    }

    #[test]
    fn multiple_inputs_get_stem_prefix() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(tmp.path(), "beach.png", 12, 8);
        let b = write_png(tmp.path(), "city.png", 6, 6);
        let out = tmp.path().join("out");

        let items = run_batch(&[a, b], &convert_png(), &RustBackend::new(), &out, None);
        assert!(items.iter().all(|i| !i.is_failure()));
        assert!(out.join("beach-converted.png").exists());
        assert!(out.join("city-converted.png").exists());
    }

    #[test]
    fn same_stem_inputs_do_not_overwrite_each_other() {
        let tmp = TempDir::new().unwrap();
        let (dir_a, dir_b) = (tmp.path().join("a"), tmp.path().join("b"));
        fs::create_dir_all(&dir_a).unwrap();
        fs::create_dir_all(&dir_b).unwrap();
        write_png(&dir_a, "photo.png", 12, 8);
        write_png(&dir_b, "photo.png", 6, 6);
        let out = tmp.path().join("out");

        let inputs = collect_inputs(&[dir_a, dir_b]).unwrap();
        let items = run_batch(&inputs, &convert_png(), &RustBackend::new(), &out, None);

        let mut filenames: Vec<String> = items
            .iter()
            .map(|item| match &item.outcome {
                Outcome::Exported { report } => report.receipt.filename.clone(),
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();
        filenames.sort();
        assert_eq!(filenames, vec!["photo-2-converted.png", "photo-converted.png"]);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 2);
        let first = image::open(out.join("photo-converted.png")).unwrap();
        let second = image::open(out.join("photo-2-converted.png")).unwrap();
        assert_eq!((first.width(), first.height()), (12, 8));
        assert_eq!((second.width(), second.height()), (6, 6));
    }

    #[test]
    fn export_prefixes_are_unique() {
        let inputs: Vec<PathBuf> = [
            "a/photo.png",
            "b/photo.jpg",
            "Photo.tif",
            "photo-2.png",
            "beach.png",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        let prefixes: Vec<String> = export_prefixes(&inputs).into_iter().flatten().collect();
        assert_eq!(
            prefixes,
            vec!["photo", "photo-2", "Photo-3", "photo-2-2", "beach"]
        );
        assert_eq!(export_prefixes(&inputs[..1]), vec![None]);
    }

    #[test]
    fn oversized_upscale_fails_only_that_input() {
        let tmp = TempDir::new().unwrap();
        let small = write_png(tmp.path(), "small.png", 1, 1);
        let big = write_png(tmp.path(), "big.png", 100, 100);
        let out = tmp.path().join("out");
        let settings = ToolSettings::Upscale {
            format: OutputFormat::Png,
            factor: 1000,
        };

        let items = run_batch(
            &[small, big],
            &settings,
            &MockBackend::proportional(1.0),
            &out,
            None,
        );
        assert!(matches!(items[0].outcome, Outcome::Exported { .. }));
        assert!(matches!(
            &items[1].outcome,
            Outcome::Failed { error } if error.contains("pixel limit")
        ));
    }

    #[test]
    fn non_image_is_skipped_and_bad_image_fails() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        let broken = tmp.path().join("broken.png");
        fs::write(&broken, b"not a png").unwrap();
        let good = write_png(tmp.path(), "good.png", 4, 4);
        let out = tmp.path().join("out");

        let items = run_batch(
            &[txt, broken, good],
            &convert_png(),
            &MockBackend::proportional(1.0),
            &out,
            None,
        );
        assert!(matches!(items[0].outcome, Outcome::Skipped));
        assert!(items[1].is_failure());
        assert!(matches!(items[2].outcome, Outcome::Exported { .. }));
    }

    #[test]
    fn crop_settings_apply_aspect_then_region() {
        let tmp = TempDir::new().unwrap();
        let input = write_png(tmp.path(), "p.png", 200, 100);
        let out = tmp.path().join("out");

        let settings = ToolSettings::Crop {
            format: OutputFormat::Png,
            aspect: AspectPreset::Ratio(1, 1),
            region: Some(CropRegion::new(10, 10, 80, 60)),
        };
        let report = run_one(&input, &settings, &MockBackend::proportional(1.0), &out, None, None)
            .unwrap()
            .unwrap();
        assert_eq!((report.receipt.width, report.receipt.height), (60, 60));
    }

    #[test]
    fn crop_region_outside_image_fails() {
        let tmp = TempDir::new().unwrap();
        let input = write_png(tmp.path(), "p.png", 20, 20);
        let out = tmp.path().join("out");
        let settings = ToolSettings::Crop {
            format: OutputFormat::Png,
            aspect: AspectPreset::Free,
            region: Some(CropRegion::new(50, 50, 5, 5)),
        };
        let err = run_one(&input, &settings, &MockBackend::proportional(1.0), &out, None, None)
            .unwrap_err();
        assert!(matches!(err, BatchError::Imaging(ImagingError::Geometry(_))));
    }

    #[test]
    fn resize_with_one_dimension_keeps_ratio() {
        let tmp = TempDir::new().unwrap();
        let input = write_png(tmp.path(), "p.png", 400, 200);
        let out = tmp.path().join("out");
        let settings = ToolSettings::Resize {
            format: OutputFormat::Png,
            width: Some(100),
            height: None,
            lock_aspect: true,
        };
        let report = run_one(&input, &settings, &MockBackend::proportional(1.0), &out, None, None)
            .unwrap()
            .unwrap();
        assert_eq!((report.receipt.width, report.receipt.height), (100, 50));
    }

    #[test]
    fn resize_with_both_dimensions_is_literal() {
        let tmp = TempDir::new().unwrap();
        let input = write_png(tmp.path(), "p.png", 400, 200);
        let out = tmp.path().join("out");
        let settings = ToolSettings::Resize {
            format: OutputFormat::Png,
            width: Some(100),
            height: Some(100),
            lock_aspect: true,
        };
        let report = run_one(&input, &settings, &MockBackend::proportional(1.0), &out, None, None)
            .unwrap()
            .unwrap();
        assert_eq!((report.receipt.width, report.receipt.height), (100, 100));
    }

    #[test]
    fn failed_item_serializes_with_status() {
        let item = BatchItem {
            source: PathBuf::from("x.png"),
            outcome: Outcome::Failed {
                error: "boom".into(),
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["source"], "x.png");
    }
}
