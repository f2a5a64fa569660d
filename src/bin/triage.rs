//! triage - analyze photos of possibly injured animals and print JSON results

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use paw_triage::{
    AnalysisResult, Analyzer, BackendRegistry, DetectorBackend, FixtureBackend, Photo,
    TriageConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file of detections replayed for every photo (fixture backend).
    #[arg(long, env = "TRIAGE_FIXTURE", conflicts_with = "model")]
    fixture: Option<PathBuf>,
    /// ONNX detector model (requires the backend-tract feature).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Include a one-line description in each result.
    #[arg(long)]
    describe: bool,
    /// Photos to analyze.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    image: String,
    #[serde(flatten)]
    result: &'a AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = TriageConfig::load()?;
    if let Some(model) = &args.model {
        config.detector.backend = "tract".to_string();
        config.detector.model_path = Some(model.clone());
    }
    if args.fixture.is_some() {
        config.detector.backend = "fixture".to_string();
    }

    let registry = build_registry(&config, &args)?;
    let backend = registry
        .get(&config.detector.backend)
        .ok_or_else(|| {
            anyhow!(
                "detector backend '{}' is not available (registered: {})",
                config.detector.backend,
                registry.list().join(", ")
            )
        })?;
    backend.warm_up()?;
    if config.detector.backend == "fixture" && args.fixture.is_none() {
        log::warn!("no detector model configured; every photo will report an unknown animal");
    }

    let analyzer = Analyzer::from_config(&config, backend);
    log::info!(
        "triage running with '{}' detector on {} image(s)",
        analyzer.detector_name(),
        args.images.len()
    );

    let mut failures = 0usize;
    for path in &args.images {
        let photo = match Photo::open(path) {
            Ok(photo) => photo,
            Err(err) => {
                log::error!("{:#}", err);
                failures += 1;
                continue;
            }
        };
        let result = analyzer.analyze(&photo);
        let output = Output {
            image: path.display().to_string(),
            result: &result,
            description: args.describe.then(|| result.describe()),
        };
        println!("{}", serde_json::to_string(&output)?);
    }

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} image(s) could not be decoded",
            failures,
            args.images.len()
        ));
    }
    Ok(())
}

fn build_registry(config: &TriageConfig, args: &Args) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    let fixture = match &args.fixture {
        Some(path) => FixtureBackend::from_json_file(path)?,
        None => FixtureBackend::empty(),
    };
    registry.register(fixture);

    if config.detector.backend == "tract" {
        registry.register_shared(load_tract_backend(config)?);
    }
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn load_tract_backend(config: &TriageConfig) -> Result<Arc<dyn DetectorBackend>> {
    let settings = &config.detector;
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract backend requires a model path (--model or TRIAGE_MODEL_PATH)"))?;
    let backend = paw_triage::TractBackend::new(model_path, settings.input_size)?
        .with_threshold(settings.confidence_threshold)
        .with_iou_threshold(settings.iou_threshold);
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract_backend(_config: &TriageConfig) -> Result<Arc<dyn DetectorBackend>> {
    Err(anyhow!(
        "tract detector requires building with the backend-tract feature"
    ))
}
