//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the tool layer (which decides what to render) and the
//! [`surface`](super::surface) / [`backend`](super::backend) pair (which do
//! the actual pixel and codec work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality in `[0, 1]`. Clamped on construction.
//! - [`Smoothing`]: Resampling mode for scaled draws.
//! - [`EncodeRequest`]: What one encode call was asked to produce.
//! - [`CropRegion`]: A committed rectangle in source-bitmap pixel space.
//! - [`Color`]: An RGBA color parsed from `#rgb` / `#rrggbb` / `#rrggbbaa`.
//! - [`WatermarkSpec`]: Text, size, color and normalized position of a watermark.

use super::format::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid color '{0}': expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor(String),
    #[error("unsupported output format '{0}'")]
    UnknownFormat(String),
    #[error("invalid aspect ratio '{0}': expected 'free' or W:H")]
    InvalidAspect(String),
    #[error("invalid crop region '{0}': expected X,Y,WIDTH,HEIGHT")]
    InvalidRegion(String),
}

/// Encoding quality for lossy formats, `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Quality(f64);

impl Quality {
    /// Quality used when the caller does not choose one (crop, resize, watermark).
    pub const HOST_DEFAULT: Quality = Quality(0.92);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::HOST_DEFAULT;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Build from a user-facing percentage (`0..=100`).
    pub fn from_percent(percent: u32) -> Self {
        Self::new(f64::from(percent) / 100.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Encoder quality as the `1..=100` integer scale the codecs expect.
    pub fn to_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::HOST_DEFAULT
    }
}

/// Resampling mode for [`RenderSurface::draw_image`](super::RenderSurface::draw_image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Bilinear. What every tool gets unless it opts in to more.
    #[default]
    Default,
    /// Lanczos3. Used by upscale, where magnification artifacts dominate.
    High,
}

/// A single encode call: target geometry, quality and format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeRequest {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub format: OutputFormat,
}

/// A rectangle in source-bitmap pixel space.
///
/// Written as `X,Y,WIDTH,HEIGHT` on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region is non-empty and lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: (u32, u32)) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(bounds.0)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(bounds.1)
    }
}

/// Parses `X,Y,WIDTH,HEIGHT`.
impl FromStr for CropRegion {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParamError::InvalidRegion(s.to_string()))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(ParamError::InvalidRegion(s.to_string())),
        }
    }
}

impl TryFrom<String> for CropRegion {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CropRegion> for String {
    fn from(region: CropRegion) -> Self {
        region.to_string()
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
}

impl FromStr for Color {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParamError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|n| n * 17)
                .map_err(|_| invalid())
        };
        match hex.len() {
            3 => Ok(Color {
                r: nibble(0)?,
                g: nibble(1)?,
                b: nibble(2)?,
                a: 255,
            }),
            6 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: 255,
            }),
            8 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// Everything needed to draw a text watermark.
///
/// Positions are percentages of the canvas size, so the same spec places the
/// text identically on images of any resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    pub text: String,
    pub font_size_px: u32,
    pub color: Color,
    pub x_percent: f32,
    pub y_percent: f32,
}

impl WatermarkSpec {
    pub fn new(text: impl Into<String>, font_size_px: u32, color: Color, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            font_size_px: font_size_px.max(1),
            color,
            x_percent: x.clamp(0.0, 100.0),
            y_percent: y.clamp(0.0, 100.0),
        }
    }
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self::new("", 40, Color::WHITE, 50.0, 50.0)
    }
}
