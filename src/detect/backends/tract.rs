#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::detect::yolo::{self, Letterbox, RawBox, COCO_LABELS};
use crate::photo::Photo;

/// Letterbox padding value used by YOLO-family exporters.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// Expects a square `1x3xSxS` float input and a `[1, 4 + classes, anchors]`
/// output of center-format boxes followed by per-class scores. The model is
/// loaded from a local file once; inference does no I/O.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `input_size` square input.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded detector model {} ({}x{} input)",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            labels: COCO_LABELS.iter().map(|label| label.to_string()).collect(),
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Replace the class label table (for models not trained on COCO).
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    fn build_input(&self, photo: &Photo, letterbox: &Letterbox) -> Tensor {
        let size = self.input_size;
        let (new_width, new_height) = (letterbox.new_width, letterbox.new_height);
        let resized =
            image::imageops::resize(photo.as_image(), new_width, new_height, FilterType::Triangle);

        let x_offset = letterbox.pad_x as u32;
        let y_offset = letterbox.pad_y as u32;
        let side = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let (x, y) = (x as u32, y as u32);
            let inside = x >= x_offset
                && x < x_offset + new_width
                && y >= y_offset
                && y < y_offset + new_height;
            if inside {
                resized.get_pixel(x - x_offset, y - y_offset)[c] as f32 / 255.0
            } else {
                PAD_VALUE
            }
        });
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, letterbox: &Letterbox) -> Result<Vec<RawBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected a [1, 4 + classes, anchors] output")?;
        let (_, rows, anchors) = view.dim();
        let flat: Vec<f32> = view.iter().copied().collect();
        yolo::decode_output(&flat, rows, anchors, letterbox, self.confidence_threshold)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&self, photo: &Photo) -> Result<Vec<Detection>> {
        let (width, height) = (photo.width(), photo.height());
        let letterbox = Letterbox::for_photo(width, height, self.input_size);
        let input = self.build_input(photo, &letterbox);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let boxes = yolo::nms(self.decode(outputs, &letterbox)?, self.iou_threshold);

        let detections: Vec<Detection> = boxes
            .iter()
            .filter_map(|raw| yolo::to_detection(raw, &self.labels, width, height))
            .collect();
        log::debug!("tract backend produced {} detections", detections.len());
        Ok(detections)
    }
}
