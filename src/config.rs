//! Tool configuration.
//!
//! Handles loading, validating, and merging `chitram.toml`. Stock defaults
//! are the base layer; a user config file overrides any subset of keys;
//! command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compress]
//! format = "image/jpeg"
//! target_kb = 0             # 0 = no size constraint
//!
//! [compress.policy]
//! initial_quality = 0.9
//! quality_floor = 0.25      # below this, shrink dimensions instead
//! quality_step = 0.07
//! scale_step = 0.9
//! max_attempts = 30
//!
//! [crop]
//! format = "image/png"
//! aspect = "free"           # or "1:1", "16:9", ...
//! # region = "0,0,640,480"
//!
//! [resize]
//! format = "image/png"
//! lock_aspect = true
//! # width = 1280            # give one side to keep the ratio, both to stretch
//! # height = 720
//!
//! [convert]
//! format = "image/webp"
//! quality = 92              # percent, 1-100
//!
//! [upscale]
//! format = "image/png"
//! factor = 2
//!
//! [watermark]
//! text = ""
//! font_size = 40            # pixels
//! color = "#ffffff"
//! x = 50.0                  # percent of width
//! y = 50.0                  # percent of height (text baseline)
//! # font = "/path/to/Bold.ttf"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::batch::ToolSettings;
use crate::imaging::{
    AspectPreset, Color, ConvergencePolicy, CropRegion, OutputFormat, ParamError, Quality,
    WatermarkSpec,
};
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid value: {0}")]
    Param(#[from] ParamError),
}

/// Configuration loaded from `chitram.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChitramConfig {
    pub compress: CompressConfig,
    pub crop: CropConfig,
    pub resize: ResizeConfig,
    pub convert: ConvertConfig,
    pub upscale: UpscaleConfig,
    pub watermark: WatermarkConfig,
    pub processing: ProcessingConfig,
}

impl ChitramConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.compress.policy;
        if !(0.0..=1.0).contains(&policy.initial_quality) {
            return Err(ConfigError::Validation(
                "compress.policy.initial_quality must be 0-1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&policy.quality_floor) {
            return Err(ConfigError::Validation(
                "compress.policy.quality_floor must be 0-1".into(),
            ));
        }
        if !(policy.quality_step > 0.0 && policy.quality_step <= 1.0) {
            return Err(ConfigError::Validation(
                "compress.policy.quality_step must be in (0, 1]".into(),
            ));
        }
        if !(policy.scale_step > 0.0 && policy.scale_step < 1.0) {
            return Err(ConfigError::Validation(
                "compress.policy.scale_step must be in (0, 1)".into(),
            ));
        }
        if self.convert.quality == 0 || self.convert.quality > 100 {
            return Err(ConfigError::Validation(
                "convert.quality must be 1-100".into(),
            ));
        }
        if self.upscale.factor == 0 {
            return Err(ConfigError::Validation(
                "upscale.factor must be at least 1".into(),
            ));
        }
        if self.watermark.font_size == 0 {
            return Err(ConfigError::Validation(
                "watermark.font_size must be positive".into(),
            ));
        }
        for (key, value) in [("x", self.watermark.x), ("y", self.watermark.y)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "watermark.{key} must be 0-100"
                )));
            }
        }
        if self.resize.width == Some(0) || self.resize.height == Some(0) {
            return Err(ConfigError::Validation(
                "resize.width and resize.height must be positive".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Settings for `tool` as configured.
    pub fn tool_settings(&self, tool: Tool) -> Result<ToolSettings, ConfigError> {
        Ok(match tool {
            Tool::Compress => ToolSettings::Compress {
                format: self.compress.format,
                target_kb: self.compress.target_kb,
                policy: self.compress.policy,
            },
            Tool::Crop => ToolSettings::Crop {
                format: self.crop.format,
                aspect: self.crop.aspect,
                region: self.crop.region,
            },
            Tool::Resize => ToolSettings::Resize {
                format: self.resize.format,
                width: self.resize.width,
                height: self.resize.height,
                lock_aspect: self.resize.lock_aspect,
            },
            Tool::Convert => ToolSettings::Convert {
                format: self.convert.format,
                quality: Quality::from_percent(self.convert.quality),
            },
            Tool::Upscale => ToolSettings::Upscale {
                format: self.upscale.format,
                factor: self.upscale.factor,
            },
            Tool::Watermark => ToolSettings::Watermark {
                spec: self.watermark.spec()?,
            },
        })
    }
}

/// Compress-to-target settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    pub format: OutputFormat,
    /// Size budget in kilobytes; 0 disables the constraint.
    pub target_kb: u32,
    /// Knobs of the quality/dimension search.
    pub policy: ConvergencePolicy,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            target_kb: 0,
            policy: ConvergencePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub format: OutputFormat,
    pub aspect: AspectPreset,
    /// Explicit selection in source pixels; whole image when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<CropRegion>,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            aspect: AspectPreset::Free,
            region: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub format: OutputFormat,
    /// Derive the missing dimension from the natural aspect ratio.
    pub lock_aspect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            lock_aspect: true,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub format: OutputFormat,
    /// Encoder quality percent (lossy formats only).
    pub quality: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::WebP,
            quality: 92,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleConfig {
    pub format: OutputFormat,
    pub factor: u32,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            factor: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub text: String,
    pub font_size: u32,
    /// `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub color: String,
    pub x: f32,
    pub y: f32,
    /// Font file; when absent a bold system sans is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 40,
            color: Color::WHITE.to_string(),
            x: 50.0,
            y: 50.0,
            font: None,
        }
    }
}

impl WatermarkConfig {
    pub fn spec(&self) -> Result<WatermarkSpec, ParamError> {
        Ok(WatermarkSpec::new(
            self.text.clone(),
            self.font_size,
            self.color.parse::<Color>()?,
            self.x,
            self.y,
        ))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of inputs processed at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// The stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ChitramConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ChitramConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ChitramConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `path` over the stock defaults. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ChitramConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// A fully-commented stock `chitram.toml`, printed by `chitram gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# chitram configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults; command-line flags override them.
# Unknown keys will cause an error.
#
# Formats accept a mime type ("image/jpeg"), a subtype ("jpeg") or an
# extension ("jpg"). Supported: jpeg, png, webp, avif.

# ---------------------------------------------------------------------------
# Compress to a target file size
# ---------------------------------------------------------------------------
[compress]
format = "image/jpeg"

# Size budget in kilobytes. 0 exports once at the initial quality.
target_kb = 0

# The search lowers quality first, then shrinks both dimensions.
[compress.policy]
initial_quality = 0.9
# Once quality is at or below this, scale the image down instead.
quality_floor = 0.25
quality_step = 0.07
# Multiplier applied to width and height on each shrink step.
scale_step = 0.9
# Give up after this many re-encodes and export the smallest result.
max_attempts = 30

# ---------------------------------------------------------------------------
# Crop
# ---------------------------------------------------------------------------
[crop]
format = "image/png"
# "free", or a ratio such as "1:1", "4:3", "3:2", "16:9", "9:16".
aspect = "free"
# Explicit selection in source pixels, trimmed to the aspect ratio.
# Omit to crop the largest centered region of that ratio.
# region = "0,0,640,480"

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
format = "image/png"
# When only one of width/height is given, derive the other from the
# original aspect ratio.
lock_aspect = true
# Target size in pixels. Omit a side to keep the original value.
# width = 1280
# height = 720

# ---------------------------------------------------------------------------
# Convert
# ---------------------------------------------------------------------------
[convert]
format = "image/webp"
# Encoder quality percent, 1-100. Ignored by lossless formats.
quality = 92

# ---------------------------------------------------------------------------
# Upscale
# ---------------------------------------------------------------------------
[upscale]
format = "image/png"
factor = 2

# ---------------------------------------------------------------------------
# Text watermark (always exported as JPEG)
# ---------------------------------------------------------------------------
[watermark]
text = ""
font_size = 40
color = "#ffffff"
# Anchor as a percentage of the image: x centers the text, y is the baseline.
x = 50.0
y = 50.0
# Bold font file. Omit to use a bold system sans.
# font = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum inputs processed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
