//! YOLOv8-style post-processing shared by model backends.
//!
//! Models see a square letterboxed input; their `[1, 4 + classes, anchors]`
//! output holds center-format boxes in input coordinates followed by one score
//! per class. Everything here is plain arithmetic on that layout, so it works
//! on a flattened output buffer and needs no inference runtime.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::detect::result::{BoundingBox, Detection};

/// Class labels of the 80-class COCO detection set, in model output order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Mapping between photo pixels and a `size` x `size` letterboxed input.
///
/// The photo is scaled so its longer side fills the input and centered on the
/// shorter axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    /// Size of the resized photo inside the input.
    pub new_width: u32,
    pub new_height: u32,
}

impl Letterbox {
    pub fn for_photo(width: u32, height: u32, size: u32) -> Self {
        let scale = size as f32 / width.max(height).max(1) as f32;
        let new_width = ((width as f32 * scale) as u32).clamp(1, size);
        let new_height = ((height as f32 * scale) as u32).clamp(1, size);
        Self {
            scale,
            pad_x: ((size - new_width) / 2) as f32,
            pad_y: ((size - new_height) / 2) as f32,
            new_width,
            new_height,
        }
    }

    /// Map an input-space x coordinate back to photo pixels.
    fn photo_x(&self, x: f32) -> f32 {
        (x - self.pad_x) / self.scale
    }

    fn photo_y(&self, y: f32) -> f32 {
        (y - self.pad_y) / self.scale
    }
}

/// A decoded box in photo coordinates, before clamping and labeling.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBox {
    pub class_id: usize,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl RawBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &RawBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Decode a row-major `[1, rows, anchors]` output into photo-space boxes.
///
/// Each anchor keeps its best class; anchors whose best score is not above
/// `threshold` are dropped.
pub fn decode_output(
    output: &[f32],
    rows: usize,
    anchors: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Result<Vec<RawBox>> {
    if rows <= 4 {
        return Err(anyhow!("model output has no class scores ({} rows)", rows));
    }
    if output.len() != rows * anchors {
        return Err(anyhow!(
            "model output has {} values, expected {} x {}",
            output.len(),
            rows,
            anchors
        ));
    }
    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    let mut boxes = Vec::new();
    for i in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for class_id in 0..rows - 4 {
            let score = at(4 + class_id, i);
            if score > best_score {
                best_score = score;
                best_class = class_id;
            }
        }
        if best_score.is_nan() || best_score <= threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        boxes.push(RawBox {
            class_id: best_class,
            x1: letterbox.photo_x(cx - w / 2.0),
            y1: letterbox.photo_y(cy - h / 2.0),
            x2: letterbox.photo_x(cx + w / 2.0),
            y2: letterbox.photo_y(cy + h / 2.0),
            confidence: best_score,
        });
    }
    Ok(boxes)
}

/// Round and clamp a raw box to a `width` x `height` photo and attach its label.
///
/// Returns `None` when nothing of the box is left inside the photo.
pub fn to_detection(
    raw: &RawBox,
    labels: &[String],
    width: u32,
    height: u32,
) -> Option<Detection> {
    let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
    let bbox = BoundingBox::new(
        clamp(raw.x1, width),
        clamp(raw.y1, height),
        clamp(raw.x2, width),
        clamp(raw.y2, height),
    )
    .ok()?;
    let species = labels
        .get(raw.class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", raw.class_id));
    Some(Detection::new(
        species,
        bbox,
        raw.confidence.clamp(0.0, 1.0) as f64,
    ))
}

/// Per-class non-maximum suppression. Output is sorted by confidence, descending.
pub fn nms(boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    let mut by_class: HashMap<usize, Vec<RawBox>> = HashMap::new();
    for raw in boxes {
        by_class.entry(raw.class_id).or_default().push(raw);
    }

    let mut kept = Vec::new();
    for (_, mut class_boxes) in by_class {
        class_boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut suppressed = vec![false; class_boxes.len()];
        for i in 0..class_boxes.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..class_boxes.len() {
                if !suppressed[j] && class_boxes[i].iou(&class_boxes[j]) > iou_threshold {
                    suppressed[j] = true;
                }
            }
            kept.push(class_boxes[i].clone());
        }
    }

    kept.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.class_id.cmp(&b.class_id))
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        COCO_LABELS.iter().map(|l| l.to_string()).collect()
    }

    /// Build a row-major `[1, 4 + classes, anchors]` buffer from per-anchor columns.
    fn output(columns: &[Vec<f32>]) -> (Vec<f32>, usize, usize) {
        let rows = columns[0].len();
        let anchors = columns.len();
        let mut data = vec![0.0; rows * anchors];
        for (anchor, column) in columns.iter().enumerate() {
            for (row, value) in column.iter().enumerate() {
                data[row * anchors + anchor] = *value;
            }
        }
        (data, rows, anchors)
    }

    fn raw(class_id: usize, x1: f32, confidence: f32) -> RawBox {
        RawBox {
            class_id,
            x1,
            y1: 0.0,
            x2: x1 + 10.0,
            y2: 10.0,
            confidence,
        }
    }

    #[test]
    fn letterbox_pads_the_shorter_axis() {
        let letterbox = Letterbox::for_photo(200, 100, 100);
        assert_eq!(letterbox.scale, 0.5);
        assert_eq!((letterbox.new_width, letterbox.new_height), (100, 50));
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 25.0));

        let tall = Letterbox::for_photo(50, 100, 100);
        assert_eq!((tall.pad_x, tall.pad_y), (25.0, 0.0));
    }

    #[test]
    fn decodes_box_back_to_photo_pixels() {
        // Three classes; anchor 0 is a confident "car" (class 2).
        let (data, rows, anchors) = output(&[vec![50.0, 50.0, 20.0, 10.0, 0.1, 0.2, 0.9]]);
        let letterbox = Letterbox::for_photo(200, 100, 100);

        let boxes = decode_output(&data, rows, anchors, &letterbox, 0.25).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.class_id, 2);
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (80.0, 40.0, 120.0, 60.0));

        let detection = to_detection(b, &labels(), 200, 100).unwrap();
        assert_eq!(detection.species, "car");
        assert_eq!(detection.bbox, BoundingBox::new(80, 40, 120, 60).unwrap());
        assert!((detection.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn scores_at_or_below_threshold_are_dropped() {
        let (data, rows, anchors) = output(&[
            vec![50.0, 50.0, 10.0, 10.0, 0.25, 0.1],
            vec![50.0, 50.0, 10.0, 10.0, 0.1, 0.3],
            vec![50.0, 50.0, 10.0, 10.0, f32::NAN, f32::NAN],
        ]);
        let letterbox = Letterbox::for_photo(100, 100, 100);

        let boxes = decode_output(&data, rows, anchors, &letterbox, 0.25).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 1);
        assert_eq!(boxes[0].confidence, 0.3);
    }

    #[test]
    fn boxes_are_clamped_to_the_photo() {
        let labels = labels();
        let spill = RawBox {
            class_id: 16,
            x1: -12.4,
            y1: 30.0,
            x2: 250.0,
            y2: 130.6,
            confidence: 1.2,
        };
        let detection = to_detection(&spill, &labels, 200, 100).unwrap();
        assert_eq!(detection.species, "dog");
        assert_eq!(detection.bbox, BoundingBox::new(0, 30, 200, 100).unwrap());
        assert_eq!(detection.confidence, 1.0);

        let outside = RawBox {
            x1: 210.0,
            x2: 260.0,
            ..spill.clone()
        };
        assert!(to_detection(&outside, &labels, 200, 100).is_none());

        let unknown_class = RawBox {
            class_id: 99,
            ..spill
        };
        assert_eq!(
            to_detection(&unknown_class, &labels, 200, 100).unwrap().species,
            "class_99"
        );
    }

    #[test]
    fn rejects_outputs_of_the_wrong_shape() {
        let letterbox = Letterbox::for_photo(100, 100, 100);
        assert!(decode_output(&[0.0; 8], 4, 2, &letterbox, 0.25).is_err());
        assert!(decode_output(&[0.0; 9], 5, 2, &letterbox, 0.25).is_err());
    }

    #[test]
    fn nms_suppresses_overlapping_boxes_of_same_class() {
        let kept = nms(vec![raw(16, 0.0, 0.6), raw(16, 1.0, 0.9)], 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let kept = nms(vec![raw(15, 0.0, 0.6), raw(16, 0.0, 0.9)], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 16);
    }

    #[test]
    fn coco_labels_cover_allowed_species() {
        assert_eq!(COCO_LABELS[15], "cat");
        assert_eq!(COCO_LABELS[16], "dog");
        assert_eq!(COCO_LABELS[17], "horse");
        assert_eq!(COCO_LABELS[19], "cow");
    }
}
