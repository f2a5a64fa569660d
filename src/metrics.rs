//! Injury feature extraction.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::color::BloodBand;
use crate::detect::Detection;
use crate::photo::Photo;

/// Visual injury indicators, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Blood-tone fraction over the whole photo.
    pub blood_ratio_global: f64,
    /// Blood-tone fraction inside the candidate box.
    pub blood_ratio_local: f64,
    /// Share of the frame covered by the candidate box.
    pub closeness: f64,
    /// `1 - confidence` of the candidate detection.
    pub confidence_penalty: f64,
}

impl FeatureVector {
    /// Used when no candidate animal is found. An unrecognizable animal in a
    /// submitted photo scores as moderately suspicious rather than zero.
    pub const FALLBACK: FeatureVector = FeatureVector {
        blood_ratio_global: 0.03,
        blood_ratio_local: 0.02,
        closeness: 0.5,
        confidence_penalty: 0.8,
    };

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("blood_ratio_global", self.blood_ratio_global),
            ("blood_ratio_local", self.blood_ratio_local),
            ("closeness", self.closeness),
            ("confidence_penalty", self.confidence_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("feature {} must be in [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Turns a photo and its selected candidate into a [`FeatureVector`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsExtractor {
    band: BloodBand,
    fallback: FeatureVector,
}

impl MetricsExtractor {
    pub fn new(band: BloodBand, fallback: FeatureVector) -> Self {
        Self { band, fallback }
    }

    pub fn band(&self) -> &BloodBand {
        &self.band
    }

    pub fn fallback(&self) -> &FeatureVector {
        &self.fallback
    }

    /// Extract features. Without a candidate the fallback vector is returned as-is.
    pub fn extract(&self, photo: &Photo, candidate: Option<&Detection>) -> FeatureVector {
        let Some(candidate) = candidate else {
            return self.fallback;
        };

        let bbox = candidate.bbox.clamp_to(photo.width(), photo.height());
        let blood_ratio_global = self.band.fraction(&photo.full());
        let blood_ratio_local = self.band.fraction(&photo.region(&bbox));
        let closeness = (bbox.area() as f64 / photo.area() as f64).min(1.0);
        let confidence = if candidate.confidence.is_nan() {
            0.0
        } else {
            candidate.confidence.clamp(0.0, 1.0)
        };

        FeatureVector {
            blood_ratio_global,
            blood_ratio_local,
            closeness,
            confidence_penalty: 1.0 - confidence,
        }
    }
}
