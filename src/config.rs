use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::color::BloodBand;
use crate::metrics::FeatureVector;
use crate::select::SpeciesAllowList;
use crate::severity::SeverityPolicy;

const DEFAULT_BACKEND: &str = "fixture";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TriageConfigFile {
    allowed_species: Option<Vec<String>>,
    policy: Option<SeverityPolicy>,
    blood_band: Option<BloodBand>,
    fallback: Option<FallbackConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FallbackConfigFile {
    blood_ratio_global: Option<f64>,
    blood_ratio_local: Option<f64>,
    closeness: Option<f64>,
    confidence_penalty: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

/// Pipeline configuration: species allow-list, scoring policy and detector.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub allowed_species: SpeciesAllowList,
    pub policy: SeverityPolicy,
    pub blood_band: BloodBand,
    pub fallback: FeatureVector,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    /// Registered backend name ("fixture" or "tract").
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            allowed_species: SpeciesAllowList::default(),
            policy: SeverityPolicy::default(),
            blood_band: BloodBand::default(),
            fallback: FeatureVector::FALLBACK,
            detector: DetectorSettings::default(),
        }
    }
}

impl TriageConfig {
    /// Load from the JSON file named by `TRIAGE_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRIAGE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit file path, ignoring the environment.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path.as_ref())?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TriageConfigFile) -> Result<Self> {
        let allowed_species = match file.allowed_species {
            Some(species) => SpeciesAllowList::new(species)?,
            None => SpeciesAllowList::default(),
        };
        let fallback_file = file.fallback.unwrap_or_default();
        let defaults = FeatureVector::FALLBACK;
        let fallback = FeatureVector {
            blood_ratio_global: fallback_file
                .blood_ratio_global
                .unwrap_or(defaults.blood_ratio_global),
            blood_ratio_local: fallback_file
                .blood_ratio_local
                .unwrap_or(defaults.blood_ratio_local),
            closeness: fallback_file.closeness.unwrap_or(defaults.closeness),
            confidence_penalty: fallback_file
                .confidence_penalty
                .unwrap_or(defaults.confidence_penalty),
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: detector_file.model_path,
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector_file
                .iou_threshold
                .unwrap_or(DEFAULT_IOU_THRESHOLD),
        };
        Ok(Self {
            allowed_species,
            policy: file.policy.unwrap_or_default(),
            blood_band: file.blood_band.unwrap_or_default(),
            fallback,
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(species) = std::env::var("TRIAGE_ALLOWED_SPECIES") {
            let parsed = split_csv(&species);
            if !parsed.is_empty() {
                self.allowed_species = SpeciesAllowList::new(parsed)?;
            }
        }
        if let Ok(backend) = std::env::var("TRIAGE_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("TRIAGE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(threshold) = std::env::var("TRIAGE_CONFIDENCE_THRESHOLD") {
            self.detector.confidence_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("TRIAGE_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.blood_band.validate()?;
        self.fallback
            .validate()
            .map_err(|e| anyhow!("invalid fallback: {}", e))?;

        let detector = &self.detector;
        if detector.backend.trim().is_empty() {
            return Err(anyhow!("detector backend must be named"));
        }
        if detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence_threshold", detector.confidence_threshold),
            ("iou_threshold", detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("detector {} must be in [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TriageConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
