//! Severity scoring.
//!
//! `raw = Σ weight_i * feature_i`, `score = clamp(floor(raw), 0, 100)`, and the
//! label is a function of the score alone. Weights and cut-points live in a
//! [`SeverityPolicy`] so they can be recalibrated from configuration.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::metrics::FeatureVector;

pub const MAX_SCORE: u8 = 100;

/// Coarse triage bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityLabel {
    Low,
    Moderate,
    Critical,
}

impl SeverityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLabel::Low => "Low",
            SeverityLabel::Moderate => "Moderate",
            SeverityLabel::Critical => "Critical",
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature weights of the raw score.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub blood_global: f64,
    pub blood_local: f64,
    pub closeness: f64,
    pub confidence_penalty: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            blood_global: 50.0,
            blood_local: 80.0,
            closeness: 40.0,
            confidence_penalty: 30.0,
        }
    }
}

/// Weights plus label cut-points.
///
/// `score < moderate_at` is Low, `score < critical_at` is Moderate, anything
/// above is Critical.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeverityPolicy {
    pub weights: SeverityWeights,
    pub moderate_at: u8,
    pub critical_at: u8,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            weights: SeverityWeights::default(),
            moderate_at: 30,
            critical_at: 70,
        }
    }
}

impl SeverityPolicy {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, weight) in [
            ("blood_global", w.blood_global),
            ("blood_local", w.blood_local),
            ("closeness", w.closeness),
            ("confidence_penalty", w.confidence_penalty),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(anyhow!(
                    "severity weight {} must be finite and non-negative, got {}",
                    name,
                    weight
                ));
            }
        }
        if self.moderate_at == 0
            || self.moderate_at >= self.critical_at
            || self.critical_at > MAX_SCORE
        {
            return Err(anyhow!(
                "severity cut-points must satisfy 0 < moderate_at < critical_at <= {} (got {} / {})",
                MAX_SCORE,
                self.moderate_at,
                self.critical_at
            ));
        }
        Ok(())
    }

    /// Unclamped weighted sum.
    pub fn raw_score(&self, features: &FeatureVector) -> f64 {
        let w = &self.weights;
        features.blood_ratio_global * w.blood_global
            + features.blood_ratio_local * w.blood_local
            + features.closeness * w.closeness
            + features.confidence_penalty * w.confidence_penalty
    }

    /// Integer score in `0..=100`.
    pub fn score(&self, features: &FeatureVector) -> u8 {
        let floored = self.raw_score(features).floor();
        if floored.is_nan() {
            return 0;
        }
        floored.clamp(0.0, MAX_SCORE as f64) as u8
    }

    pub fn label(&self, score: u8) -> SeverityLabel {
        if score < self.moderate_at {
            SeverityLabel::Low
        } else if score < self.critical_at {
            SeverityLabel::Moderate
        } else {
            SeverityLabel::Critical
        }
    }
}
