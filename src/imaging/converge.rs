//! Size-targeted compression.
//!
//! [`CompressionConverger`] re-renders and re-encodes a bitmap until the
//! encoded size fits a kilobyte budget or the attempt cap is reached.
//!
//! ## Strategy
//!
//! ```text
//! render at natural size, quality 0.90
//! while over budget and attempts < 30:
//!     quality > 0.25 ? quality -= 0.07      (phase 1: same pixels, cheaper bits)
//!                    : width, height *= 0.9 (phase 2: fewer pixels)
//!     re-render, attempts += 1
//! ```
//!
//! Quality is exhausted before any geometry is given up, because a smaller
//! picture cannot be recovered later while a lower quality costs no
//! resolution. The cap guarantees termination; missing the budget is not an
//! error. The caller gets the smallest encode produced and a `target_met`
//! flag.

use super::backend::{EncodeResult, ImageBackend, ImagingError};
use super::bitmap::Bitmap;
use super::calculations::render_dimension;
use super::format::OutputFormat;
use super::params::{EncodeRequest, Quality, Smoothing};
use super::surface::RenderSurface;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tunable constants of the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergencePolicy {
    /// Quality of the first encode (and of unconstrained encodes).
    pub initial_quality: f64,
    /// Quality steps stop once quality is at or below this value.
    pub quality_floor: f64,
    /// Amount subtracted from quality per phase-1 attempt.
    pub quality_step: f64,
    /// Linear factor applied to both dimensions per phase-2 attempt.
    pub scale_step: f64,
    /// Hard cap on re-encodes after the first.
    pub max_attempts: u32,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            initial_quality: 0.9,
            quality_floor: 0.25,
            quality_step: 0.07,
            scale_step: 0.9,
            max_attempts: 30,
        }
    }
}

/// Loop state. Fractional dimensions are kept so repeated scaling does not
/// accumulate rounding; they are rounded only when the surface is configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvergenceState {
    pub width: f64,
    pub height: f64,
    pub quality: f64,
    pub attempts: u32,
}

/// Outcome of a convergence run.
#[derive(Debug, Clone)]
pub struct Convergence {
    /// Smallest encode produced. When the target was met this is the final one.
    pub result: EncodeResult,
    /// Quality `result` was encoded at.
    pub quality: f64,
    /// Loop state at termination.
    pub state: ConvergenceState,
    /// `false` when a budget was set and the loop ran out of attempts.
    pub target_met: bool,
    /// Every encode issued, in order; `trace[0]` is the first pass.
    pub trace: Vec<EncodeRequest>,
    /// Byte size of each encode, parallel to `trace`.
    pub sizes: Vec<usize>,
}

impl Convergence {
    /// Re-encodes after the first pass.
    pub fn attempts(&self) -> u32 {
        self.state.attempts
    }
}

pub struct CompressionConverger<'a, B: ImageBackend> {
    backend: &'a B,
    policy: ConvergencePolicy,
}

impl<'a, B: ImageBackend> CompressionConverger<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self::with_policy(backend, ConvergencePolicy::default())
    }

    pub fn with_policy(backend: &'a B, policy: ConvergencePolicy) -> Self {
        Self { backend, policy }
    }

    fn render(
        &self,
        surface: &mut RenderSurface,
        bitmap: &Bitmap,
        state: &ConvergenceState,
        format: OutputFormat,
    ) -> Result<EncodeResult, ImagingError> {
        let (w, h) = (render_dimension(state.width), render_dimension(state.height));
        surface.configure(w, h);
        surface.clear();
        surface.draw_image(bitmap, w, h, Smoothing::Default);
        surface.encode(self.backend, format, Quality::new(state.quality))
    }

    /// Encode `bitmap` as `format`, shrinking until it fits `target_kb`.
    ///
    /// `None` or `Some(0)` means unconstrained: a single encode at the
    /// initial quality.
    pub fn converge(
        &self,
        bitmap: &Bitmap,
        format: OutputFormat,
        target_kb: Option<u32>,
    ) -> Result<Convergence, ImagingError> {
        let target_kb = target_kb.filter(|kb| *kb > 0).map(f64::from);
        let over_budget = |r: &EncodeResult| target_kb.is_some_and(|kb| r.kilobytes() > kb);

        let mut state = ConvergenceState {
            width: f64::from(bitmap.width()),
            height: f64::from(bitmap.height()),
            quality: self.policy.initial_quality,
            attempts: 0,
        };
        let mut surface = RenderSurface::new(bitmap.width(), bitmap.height());
        let mut trace = Vec::new();
        let mut sizes = Vec::new();

        let mut current = self.render(&mut surface, bitmap, &state, format)?;
        trace.push(request_of(&current, state.quality));
        sizes.push(current.byte_size());
        let mut best = current.clone();
        let mut best_quality = state.quality;

        while over_budget(&current) && state.attempts < self.policy.max_attempts {
            if state.quality > self.policy.quality_floor {
                state.quality = (state.quality - self.policy.quality_step).max(0.0);
            } else {
                state.width *= self.policy.scale_step;
                state.height *= self.policy.scale_step;
            }

            current = self.render(&mut surface, bitmap, &state, format)?;
            state.attempts += 1;
            debug!(
                attempt = state.attempts,
                quality = state.quality,
                width = current.width,
                height = current.height,
                kb = current.kilobytes(),
                "convergence attempt"
            );
            trace.push(request_of(&current, state.quality));
            sizes.push(current.byte_size());
            if current.byte_size() <= best.byte_size() {
                best = current.clone();
                best_quality = state.quality;
            }
        }

        let target_met = !over_budget(&current);
        if target_met {
            best = current;
            best_quality = state.quality;
        } else {
            warn!(
                target_kb = target_kb.unwrap_or_default(),
                best_kb = best.kilobytes(),
                attempts = state.attempts,
                "size target not reached; exporting best effort"
            );
        }
        info!(
            kb = format_args!("{:.2}", best.kilobytes()),
            quality = best_quality,
            attempts = state.attempts,
            "final size"
        );

        Ok(Convergence {
            result: best,
            quality: best_quality,
            state,
            target_met,
            trace,
            sizes,
        })
    }
}

fn request_of(result: &EncodeResult, quality: f64) -> EncodeRequest {
    EncodeRequest {
        width: result.width,
        height: result.height,
        quality: Quality::new(quality),
        format: result.format,
    }
}
