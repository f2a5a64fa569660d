use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::photo::Photo;

/// Deterministic backend that replays a fixed detection list.
///
/// Used by tests and by the CLI `--fixture` flag to exercise scoring without a
/// model. A fixture can also be configured to fail on every call.
#[derive(Clone, Debug)]
pub struct FixtureBackend {
    outcome: FixtureOutcome,
}

#[derive(Clone, Debug)]
enum FixtureOutcome {
    Detections(Vec<Detection>),
    Failure(String),
}

impl FixtureBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            outcome: FixtureOutcome::Detections(detections),
        }
    }

    /// Backend that never detects anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Backend whose `detect` always returns an error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: FixtureOutcome::Failure(message.into()),
        }
    }

    /// Load detections from a JSON array of `Detection` objects.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let detections: Vec<Detection> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid fixture {}: {}", path.display(), e))?;
        for (index, detection) in detections.iter().enumerate() {
            detection.validate().with_context(|| {
                format!("invalid fixture {}: detection {}", path.display(), index)
            })?;
        }
        Ok(Self::new(detections))
    }
}

impl DetectorBackend for FixtureBackend {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn detect(&self, _photo: &Photo) -> Result<Vec<Detection>> {
        match &self.outcome {
            FixtureOutcome::Detections(detections) => Ok(detections.clone()),
            FixtureOutcome::Failure(message) => Err(anyhow!("{}", message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn photo() -> Photo {
        Photo::from_rgb(4, 4, vec![0; 48]).unwrap()
    }

    #[test]
    fn replays_detections_in_order() {
        let backend = FixtureBackend::new(vec![
            Detection::new("cat", BoundingBox::new(0, 0, 2, 2).unwrap(), 0.6),
            Detection::new("dog", BoundingBox::new(1, 1, 4, 4).unwrap(), 0.9),
        ]);

        for _ in 0..3 {
            let detections = backend.detect(&photo()).unwrap();
            let species: Vec<&str> = detections.iter().map(|d| d.species.as_str()).collect();
            assert_eq!(species, vec!["cat", "dog"]);
        }
    }

    #[test]
    fn failing_fixture_returns_error() {
        let backend = FixtureBackend::failing("model unavailable");
        let err = backend.detect(&photo()).unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[test]
    fn loads_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp fixture");
        std::io::Write::write_all(
            &mut file,
            br#"[{"species":"horse","bbox":{"x1":0,"y1":0,"x2":3,"y2":3},"confidence":0.5}]"#,
        )
        .expect("write fixture");

        let backend = FixtureBackend::from_json_file(file.path()).unwrap();
        let detections = backend.detect(&photo()).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].species, "horse");
    }

    fn fixture_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp fixture");
        std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write fixture");
        file
    }

    #[test]
    fn rejects_inverted_box_in_fixture_file() {
        let file = fixture_file(
            r#"[{"species":"dog","bbox":{"x1":0,"y1":0,"x2":3,"y2":3},"confidence":0.5},
                {"species":"cat","bbox":{"x1":9,"y1":0,"x2":2,"y2":3},"confidence":0.5}]"#,
        );
        let err = FixtureBackend::from_json_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("detection 1"));
        assert!(format!("{:#}", err).contains("degenerate bounding box"));
    }

    #[test]
    fn rejects_out_of_range_confidence_in_fixture_file() {
        let file = fixture_file(
            r#"[{"species":"dog","bbox":{"x1":0,"y1":0,"x2":3,"y2":3},"confidence":1.5}]"#,
        );
        let err = FixtureBackend::from_json_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("confidence must be in [0, 1]"));
    }

    #[test]
    fn rejects_malformed_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp fixture");
        std::io::Write::write_all(&mut file, b"{not json").expect("write fixture");
        assert!(FixtureBackend::from_json_file(file.path()).is_err());
    }
}
