//! Injured-animal photo triage.
//!
//! This crate turns a photo suspected to show an injured animal into a triage
//! signal: the most likely species and a bounded injury severity score with a
//! three-tier label. Dispatch, persistence and authentication live upstream;
//! this crate never touches the network or stores reports.
//!
//! # Pipeline
//!
//! 1. **Detect**: an injected [`DetectorBackend`] lists objects in the photo.
//!    Detector failures are recovered as "no detections".
//! 2. **Select**: the allowed detection covering the most of the photo.
//! 3. **Extract**: blood-tone ratios (whole photo and candidate crop), frame
//!    coverage and confidence penalty, or fixed fallback features when no
//!    candidate exists.
//! 4. **Score**: weighted sum floored and clamped to `0..=100`, then bucketed
//!    into Low / Moderate / Critical.
//!
//! # Module Structure
//!
//! - `photo`: decoded photo container and region views
//! - `detect`: detector trait, detections, backend registry and backends
//! - `color`: HSV blood-tone metric
//! - `select`: candidate selection
//! - `metrics`: injury feature extraction
//! - `severity`: scoring policy and labels
//! - `analysis`: the `Analyzer` entry point
//! - `config`: file and environment configuration

pub mod analysis;
pub mod color;
pub mod config;
pub mod detect;
pub mod metrics;
pub mod photo;
pub mod select;
pub mod severity;

pub use analysis::{AnalysisResult, Analyzer, Assessment, UNKNOWN_ANIMAL};
pub use color::{BloodBand, Hsv};
pub use config::{DetectorSettings, TriageConfig};
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend, FixtureBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use metrics::{FeatureVector, MetricsExtractor};
pub use photo::{Photo, Region};
pub use select::{select_candidate, SpeciesAllowList};
pub use severity::{SeverityLabel, SeverityPolicy, SeverityWeights, MAX_SCORE};
