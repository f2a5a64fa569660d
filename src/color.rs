//! Blood-tone color metric.
//!
//! Pixels are converted to hue/saturation/value and counted when they fall in
//! a low-hue red band with enough saturation and brightness. The same
//! [`BloodBand`] is applied to the whole photo and to the candidate crop.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::photo::Region;

/// HSV thresholds for "blood-like" pixels.
///
/// Hue is in degrees, saturation and value are fractions of their maximum.
/// The defaults are hue `0..=30` degrees (`0..=15` on the half-degree 8-bit
/// scale) with saturation and value of at least `40/255`. Matching happens on
/// the rounded 8-bit scale, so a 30.6 degree hue still counts as 15.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BloodBand {
    pub hue_max_degrees: f64,
    pub saturation_min: f64,
    pub value_min: f64,
}

impl Default for BloodBand {
    fn default() -> Self {
        Self {
            hue_max_degrees: 30.0,
            saturation_min: 40.0 / 255.0,
            value_min: 40.0 / 255.0,
        }
    }
}

impl BloodBand {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..360.0).contains(&self.hue_max_degrees) {
            return Err(anyhow!(
                "blood band hue_max_degrees must be in [0, 360), got {}",
                self.hue_max_degrees
            ));
        }
        for (name, value) in [
            ("saturation_min", self.saturation_min),
            ("value_min", self.value_min),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("blood band {} must be in [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Whether a single RGB pixel falls inside the band.
    ///
    /// Pixel and thresholds are compared on the 8-bit HSV scale (hue in
    /// half-degrees `0..180`, saturation and value in `0..=255`), with pixel
    /// values rounded to the nearest step before comparison.
    pub fn matches(&self, rgb: [u8; 3]) -> bool {
        let pixel = Hsv::from_rgb(rgb).to_u8_scale();
        let hue_max = (self.hue_max_degrees / 2.0).round();
        let saturation_min = (self.saturation_min * 255.0).round();
        let value_min = (self.value_min * 255.0).round();
        pixel[0] as f64 <= hue_max
            && pixel[1] as f64 >= saturation_min
            && pixel[2] as f64 >= value_min
    }

    /// Fraction of pixels in `region` inside the band; 0 for an empty region.
    pub fn fraction(&self, region: &Region<'_>) -> f64 {
        let total = region.pixel_count();
        if total == 0 {
            return 0.0;
        }
        let hits = region.pixels().filter(|&rgb| self.matches(rgb)).count();
        hits as f64 / total as f64
    }
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Hsv {
    pub fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let chroma = (max - min) as f64;
        let value = max as f64 / 255.0;
        let saturation = if max == 0 { 0.0 } else { chroma / max as f64 };

        let (r, g, b) = (r as f64, g as f64, b as f64);
        let hue = if chroma == 0.0 {
            0.0
        } else if max as f64 == r {
            60.0 * (g - b) / chroma
        } else if max as f64 == g {
            120.0 + 60.0 * (b - r) / chroma
        } else {
            240.0 + 60.0 * (r - g) / chroma
        };
        let hue = if hue < 0.0 { hue + 360.0 } else { hue };

        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Quantize to 8-bit `[hue / 2, saturation * 255, value * 255]`.
    ///
    /// A hue that rounds up to 180 wraps to 0.
    pub fn to_u8_scale(&self) -> [u8; 3] {
        let mut hue = (self.hue / 2.0).round();
        if hue >= 180.0 {
            hue -= 180.0;
        }
        [
            hue as u8,
            (self.saturation * 255.0).round() as u8,
            (self.value * 255.0).round() as u8,
        ]
    }
}
