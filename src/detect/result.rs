use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in photo pixel coordinates: `x1 < x2`, `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(anyhow!(
                "degenerate bounding box ({}, {}, {}, {})",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// `(x2 - x1) * (y2 - y1)`; zero for degenerate boxes.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Clip the box to a `width` x `height` photo.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        }
    }
}

/// One object reported by a detector backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detector label, e.g. "dog". Matched case-sensitively.
    pub species: String,
    pub bbox: BoundingBox,
    /// Detector confidence in `0..=1`.
    pub confidence: f64,
}

impl Detection {
    pub fn new(species: impl Into<String>, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            species: species.into(),
            bbox,
            confidence,
        }
    }

    /// Check invariants that deserialized detections do not enforce.
    pub fn validate(&self) -> Result<()> {
        let b = &self.bbox;
        BoundingBox::new(b.x1, b.y1, b.x2, b.y2)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "detection confidence must be in [0, 1], got {}",
                self.confidence
            ));
        }
        Ok(())
    }
}
