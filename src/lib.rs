//! # chitram
//!
//! A raster image toolkit: compress to a target file size, crop, resize,
//! convert between formats, upscale, and stamp a text watermark. Every tool
//! follows the same path:
//!
//! ```text
//! Upload ──decode──► Bitmap ──draw──► RenderSurface ──encode──► EncodeResult ──► ExportSink
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Decode, draw, encode: bitmaps, the render surface, codecs, glyphs, the compression converger |
//! | [`tools`] | The six tools as data ([`tools::ToolRequest`]) plus pure render/encode dispatch |
//! | [`session`] | Explicit per-user state: loaded images, crop selection, resize form, watermark preview, reset after export |
//! | [`export`] | Where encoded bytes go: atomic file writes or memory |
//! | [`batch`] | Input discovery and parallel one-session-per-input processing for the CLI |
//! | [`config`] | `chitram.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting, text and JSON |
//!
//! # Design Decisions
//!
//! ## One Surface, One Seam
//!
//! All pixel work happens on a [`imaging::RenderSurface`] and all byte
//! production goes through the [`imaging::ImageBackend`] trait. Tools never
//! call a codec directly, so every tool is testable with a recording mock
//! backend whose output size is a function of the request.
//!
//! ## Compression Is a Search, Not a Setting
//!
//! [`imaging::CompressionConverger`] lowers quality in fixed steps, then
//! shrinks both dimensions, re-encoding after each step until the file fits
//! or the attempt cap is hit. A missed target is not an error: the smallest
//! result seen is exported and a warning is logged. Dimensions are tracked
//! as floats across shrink steps and rounded only when the surface is
//! configured, so repeated 0.9× steps do not drift.
//!
//! ## Explicit Session, Reset on Completion
//!
//! [`session::Session`] is a plain value owned by the caller. Exporting takes
//! `&mut self`, so two exports on one session cannot overlap, and the reset
//! happens exactly when the sink reports success. A failed export leaves the
//! session untouched.
//!
//! ## Text Without a Bundled Font
//!
//! Watermark text is rasterized with `fontdue` from a configured font file
//! or a bold system sans. Layout lives behind
//! [`imaging::GlyphRasterizer`]; tests use the font-free
//! [`imaging::BlockGlyphs`] so anchor and centering math is checked without
//! depending on installed fonts.
//!
//! ## Pure-Rust Codecs
//!
//! The [`imaging`] module uses the `image` crate encoders (JPEG, PNG,
//! lossless WebP, and AVIF through `rav1e`). No system libraries are
//! needed; the binary is self-contained.

pub mod batch;
pub mod config;
pub mod export;
pub mod imaging;
pub mod output;
pub mod session;
pub mod tools;
