//! Analysis orchestration: photo in, triage result out.
//!
//! `Analyzer` composes detector, candidate selection, feature extraction and
//! scoring. It owns no mutable state, so one analyzer can be shared across
//! threads and analyses can run in parallel per photo.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::color::BloodBand;
use crate::config::TriageConfig;
use crate::detect::{Detection, DetectorBackend};
use crate::metrics::{FeatureVector, MetricsExtractor};
use crate::photo::Photo;
use crate::select::{select_candidate, SpeciesAllowList};
use crate::severity::{SeverityLabel, SeverityPolicy};

/// Animal name reported when no allowed species was detected.
pub const UNKNOWN_ANIMAL: &str = "Unknown";

/// Final triage signal handed to the reporting layer.
///
/// Serializes as `{"animal": .., "severity": .., "score": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    animal: String,
    #[serde(rename = "severity")]
    label: SeverityLabel,
    score: u8,
}

impl AnalysisResult {
    /// Capitalized species name, or "Unknown".
    pub fn animal(&self) -> &str {
        &self.animal
    }

    pub fn label(&self) -> SeverityLabel {
        self.label
    }

    /// Severity score in `0..=100`.
    pub fn score(&self) -> u8 {
        self.score
    }

    /// One-line summary suitable for a report description.
    pub fn describe(&self) -> String {
        if self.animal == UNKNOWN_ANIMAL {
            format!(
                "No recognizable animal detected; {} severity assumed (score {}/100).",
                self.label, self.score
            )
        } else {
            format!(
                "{} detected with {} injury severity (score {}/100).",
                self.animal, self.label, self.score
            )
        }
    }
}

/// Full breakdown of one analysis: the result plus what produced it.
#[derive(Clone, Debug)]
pub struct Assessment {
    pub result: AnalysisResult,
    pub candidate: Option<Detection>,
    pub features: FeatureVector,
    /// Set when the detector failed and its output was replaced by nothing.
    pub detector_error: Option<String>,
}

/// The triage pipeline, configured at construction time.
#[derive(Clone)]
pub struct Analyzer {
    detector: Arc<dyn DetectorBackend>,
    allow_list: SpeciesAllowList,
    extractor: MetricsExtractor,
    policy: SeverityPolicy,
}

impl Analyzer {
    /// Analyzer with the default allow-list, blood band, fallback and policy.
    pub fn new(detector: Arc<dyn DetectorBackend>) -> Self {
        Self {
            detector,
            allow_list: SpeciesAllowList::default(),
            extractor: MetricsExtractor::default(),
            policy: SeverityPolicy::default(),
        }
    }

    /// Analyzer configured from a loaded [`TriageConfig`].
    pub fn from_config(config: &TriageConfig, detector: Arc<dyn DetectorBackend>) -> Self {
        Self {
            detector,
            allow_list: config.allowed_species.clone(),
            extractor: MetricsExtractor::new(config.blood_band, config.fallback),
            policy: config.policy,
        }
    }

    pub fn with_allow_list(mut self, allow_list: SpeciesAllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn with_policy(mut self, policy: SeverityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_blood_band(mut self, band: BloodBand) -> Self {
        self.extractor = MetricsExtractor::new(band, *self.extractor.fallback());
        self
    }

    pub fn with_fallback(mut self, fallback: FeatureVector) -> Self {
        self.extractor = MetricsExtractor::new(*self.extractor.band(), fallback);
        self
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn policy(&self) -> &SeverityPolicy {
        &self.policy
    }

    /// Analyze a decoded photo. Always returns a complete result.
    pub fn analyze(&self, photo: &Photo) -> AnalysisResult {
        self.assess(photo).result
    }

    /// Decode then analyze. Fails only when the bytes are not a valid image.
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<AnalysisResult> {
        let photo = Photo::decode(bytes)?;
        Ok(self.analyze(&photo))
    }

    /// Species only, without severity scoring.
    pub fn identify(&self, photo: &Photo) -> String {
        let (detections, _) = self.detect(photo);
        animal_name(select_candidate(
            &detections,
            &self.allow_list,
            photo.width(),
            photo.height(),
        ))
    }

    /// Analyze and keep the intermediate candidate and features.
    pub fn assess(&self, photo: &Photo) -> Assessment {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "analyzing photo {} ({}x{}) with '{}' detector",
                photo.fingerprint(),
                photo.width(),
                photo.height(),
                self.detector.name()
            );
        }

        let (detections, detector_error) = self.detect(photo);
        let candidate = select_candidate(
            &detections,
            &self.allow_list,
            photo.width(),
            photo.height(),
        );
        let features = self.extractor.extract(photo, candidate);
        let score = self.policy.score(&features);
        let result = AnalysisResult {
            animal: animal_name(candidate),
            label: self.policy.label(score),
            score,
        };

        log::info!(
            "triage result: animal={} severity={} score={}",
            result.animal,
            result.label,
            result.score
        );

        Assessment {
            result,
            candidate: candidate.cloned(),
            features,
            detector_error,
        }
    }

    /// Run the detector; errors and panics both become "no detections".
    fn detect(&self, photo: &Photo) -> (Vec<Detection>, Option<String>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.detector.detect(photo)));
        let error = match outcome {
            Ok(Ok(detections)) => return (detections, None),
            Ok(Err(err)) => format!("{:#}", err),
            Err(payload) => format!("detector panicked: {}", panic_message(payload.as_ref())),
        };
        log::warn!(
            "detector '{}' failed, continuing with no detections: {}",
            self.detector.name(),
            error
        );
        (Vec::new(), Some(error))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

fn animal_name(candidate: Option<&Detection>) -> String {
    candidate
        .map(|c| capitalize(&c.species))
        .unwrap_or_else(|| UNKNOWN_ANIMAL.to_string())
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, FixtureBackend};

    fn gray_photo() -> Photo {
        Photo::from_fn(100, 100, |_, _| [90, 90, 90]).unwrap()
    }

    fn analyzer(backend: FixtureBackend) -> Analyzer {
        Analyzer::new(Arc::new(backend))
    }

    #[test]
    fn capitalize_matches_species_display() {
        assert_eq!(capitalize("dog"), "Dog");
        assert_eq!(capitalize("hORSE"), "Horse");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn detector_failure_is_treated_as_no_detections() {
        let assessment = analyzer(FixtureBackend::failing("weights missing")).assess(&gray_photo());
        assert_eq!(assessment.result.animal(), UNKNOWN_ANIMAL);
        assert_eq!(assessment.features, FeatureVector::FALLBACK);
        assert!(assessment
            .detector_error
            .as_deref()
            .is_some_and(|e| e.contains("weights missing")));
        assert_eq!(assessment.result.score(), 47);
    }

    struct PanickingBackend;

    impl DetectorBackend for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn detect(&self, _photo: &Photo) -> Result<Vec<Detection>> {
            panic!("index out of bounds in model output");
        }
    }

    #[test]
    fn detector_panic_is_treated_as_no_detections() {
        let analyzer = Analyzer::new(Arc::new(PanickingBackend));

        let assessment = analyzer.assess(&gray_photo());
        assert_eq!(assessment.result.animal(), UNKNOWN_ANIMAL);
        assert_eq!(assessment.features, FeatureVector::FALLBACK);
        assert_eq!(assessment.result.score(), 47);
        assert!(assessment
            .detector_error
            .as_deref()
            .is_some_and(|e| e.contains("index out of bounds")));

        assert_eq!(analyzer.identify(&gray_photo()), UNKNOWN_ANIMAL);
    }

    #[test]
    fn identify_returns_species_without_scoring() {
        let backend = FixtureBackend::new(vec![Detection::new(
            "cow",
            BoundingBox::new(0, 0, 30, 30).unwrap(),
            0.7,
        )]);
        assert_eq!(analyzer(backend).identify(&gray_photo()), "Cow");
        assert_eq!(
            analyzer(FixtureBackend::failing("boom")).identify(&gray_photo()),
            UNKNOWN_ANIMAL
        );
    }

    #[test]
    fn describe_mentions_animal_and_severity() {
        let backend = FixtureBackend::new(vec![Detection::new(
            "dog",
            BoundingBox::new(0, 0, 40, 100).unwrap(),
            0.9,
        )]);
        let result = analyzer(backend).analyze(&gray_photo());
        assert_eq!(
            result.describe(),
            "Dog detected with Low injury severity (score 19/100)."
        );

        let unknown = analyzer(FixtureBackend::empty()).analyze(&gray_photo());
        assert_eq!(
            unknown.describe(),
            "No recognizable animal detected; Moderate severity assumed (score 47/100)."
        );
    }

    #[test]
    fn result_serializes_to_report_fields() {
        let result = analyzer(FixtureBackend::empty()).analyze(&gray_photo());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"animal": "Unknown", "severity": "Moderate", "score": 47})
        );
    }

    #[test]
    fn analyze_bytes_rejects_invalid_images() {
        let err = analyzer(FixtureBackend::empty())
            .analyze_bytes(b"not an image")
            .unwrap_err();
        assert!(err.to_string().contains("decode image"));
    }

    #[test]
    fn analyzer_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();
    }
}
