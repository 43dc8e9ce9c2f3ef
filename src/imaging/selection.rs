//! Crop selection.
//!
//! Stands in for the interactive crop widget: it owns the current rectangle,
//! keeps it inside the image, and enforces the chosen aspect ratio. The crop
//! transform only ever sees the committed [`CropRegion`].

use super::calculations::{clamp_region, constrain_to_aspect, fit_aspect_region};
use super::params::{CropRegion, ParamError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aspect ratio constraint for a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectPreset {
    #[default]
    Free,
    Ratio(u32, u32),
}

impl AspectPreset {
    /// Presets offered by default.
    pub const PRESETS: [AspectPreset; 6] = [
        Self::Free,
        Self::Ratio(1, 1),
        Self::Ratio(4, 3),
        Self::Ratio(3, 2),
        Self::Ratio(16, 9),
        Self::Ratio(9, 16),
    ];

    pub fn ratio(self) -> Option<(u32, u32)> {
        match self {
            Self::Free => None,
            Self::Ratio(w, h) => Some((w, h)),
        }
    }
}

impl FromStr for AspectPreset {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("free") {
            return Ok(Self::Free);
        }
        let invalid = || ParamError::InvalidAspect(s.to_string());
        let (w, h) = s.split_once(':').ok_or_else(invalid)?;
        let w: u32 = w.trim().parse().map_err(|_| invalid())?;
        let h: u32 = h.trim().parse().map_err(|_| invalid())?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        Ok(Self::Ratio(w, h))
    }
}

impl TryFrom<String> for AspectPreset {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectPreset> for String {
    fn from(preset: AspectPreset) -> Self {
        preset.to_string()
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Ratio(w, h) => write!(f, "{w}:{h}"),
        }
    }
}

/// Live crop rectangle over one bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropSelector {
    bounds: (u32, u32),
    aspect: AspectPreset,
    region: CropRegion,
}

impl CropSelector {
    /// Start with the whole image selected.
    pub fn new(bounds: (u32, u32)) -> Self {
        Self {
            bounds,
            aspect: AspectPreset::Free,
            region: fit_aspect_region(bounds, None),
        }
    }

    pub fn aspect(&self) -> AspectPreset {
        self.aspect
    }

    /// Change the ratio and re-fit the largest centered region for it.
    pub fn set_aspect(&mut self, aspect: AspectPreset) {
        self.aspect = aspect;
        self.region = fit_aspect_region(self.bounds, aspect.ratio());
    }

    /// Move/resize the selection. The region is clipped to the image and,
    /// with a ratio locked, trimmed to it. A region entirely outside the
    /// image leaves the selection unchanged and returns `false`.
    pub fn select(&mut self, region: CropRegion) -> bool {
        let Some(clipped) = clamp_region(region, self.bounds) else {
            return false;
        };
        self.region = match self.aspect.ratio() {
            Some(ratio) => constrain_to_aspect(clipped, ratio),
            None => clipped,
        };
        true
    }

    /// The region the crop transform should extract.
    pub fn commit(&self) -> CropRegion {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_presets() {
        assert_eq!("free".parse(), Ok(AspectPreset::Free));
        assert_eq!("FREE".parse(), Ok(AspectPreset::Free));
        assert_eq!("16:9".parse(), Ok(AspectPreset::Ratio(16, 9)));
        assert_eq!(" 4 : 3 ".parse(), Ok(AspectPreset::Ratio(4, 3)));
    }

    #[test]
    fn reject_bad_presets() {
        for bad in ["", "16x9", "0:1", "1:0", "a:b", "1.5"] {
            assert!(bad.parse::<AspectPreset>().is_err(), "{bad}");
        }
    }

    #[test]
    fn preset_display_round_trips() {
        for preset in AspectPreset::PRESETS {
            assert_eq!(preset.to_string().parse(), Ok(preset));
        }
    }

    #[test]
    fn new_selector_covers_whole_image() {
        let sel = CropSelector::new((640, 480));
        assert_eq!(sel.commit(), CropRegion::new(0, 0, 640, 480));
    }

    #[test]
    fn set_aspect_refits_centered() {
        let mut sel = CropSelector::new((640, 480));
        sel.set_aspect(AspectPreset::Ratio(1, 1));
        assert_eq!(sel.commit(), CropRegion::new(80, 0, 480, 480));

        sel.set_aspect(AspectPreset::Free);
        assert_eq!(sel.commit(), CropRegion::new(0, 0, 640, 480));
    }

    #[test]
    fn select_clips_to_image() {
        let mut sel = CropSelector::new((100, 100));
        assert!(sel.select(CropRegion::new(50, 60, 500, 500)));
        assert_eq!(sel.commit(), CropRegion::new(50, 60, 50, 40));
    }

    #[test]
    fn select_enforces_locked_ratio() {
        let mut sel = CropSelector::new((400, 400));
        sel.set_aspect(AspectPreset::Ratio(2, 1));
        assert!(sel.select(CropRegion::new(0, 0, 300, 300)));
        assert_eq!(sel.commit(), CropRegion::new(0, 0, 300, 150));
    }

    #[test]
    fn select_outside_keeps_previous_region() {
        let mut sel = CropSelector::new((100, 100));
        assert!(!sel.select(CropRegion::new(100, 0, 10, 10)));
        assert_eq!(sel.commit(), CropRegion::new(0, 0, 100, 100));
    }
}
