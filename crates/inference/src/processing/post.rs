use crate::types::{BoundingBox, RawDetection};
use ndarray::ArrayViewD;
use preprocess::LetterboxTransform;

/// Decodes YOLOv8 detection heads into raw detections.
///
/// Expects the exported `output0` tensor, shaped `[1, 4 + num_classes, anchors]`
/// with boxes in `cxcywh` input-pixel space and per-class scores already
/// activated.
pub struct YoloPostProcessor {
    pub iou_threshold: f32,
    pub max_detections: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: usize,
}

impl YoloPostProcessor {
    pub fn new(iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            iou_threshold,
            max_detections,
        }
    }

    #[tracing::instrument(skip(self, output, transform, class_names))]
    pub fn decode(
        &self,
        output: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
        class_names: &[String],
        confidence_floor: f64,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            anyhow::bail!(
                "Unexpected detector output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            );
        }

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];
        let floor = confidence_floor as f32;

        let mut candidates = Vec::new();
        for i in 0..num_anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c;
                }
            }

            if confidence.is_nan() || confidence < floor {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                output[[0, 0, i]],
                output[[0, 1, i]],
                output[[0, 2, i]],
                output[[0, 3, i]],
            );
            candidates.push(Candidate {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id,
            });
        }

        let kept = self.nms(candidates);
        tracing::debug!(kept = kept.len(), "Decoded detector output");

        Ok(kept
            .into_iter()
            .map(|c| {
                let (x1, y1) = transform.to_original(c.x1, c.y1);
                let (x2, y2) = transform.to_original(c.x2, c.y2);
                RawDetection {
                    raw_label: class_label(class_names, c.class_id),
                    confidence: f64::from(c.confidence),
                    bbox: BoundingBox::new(
                        f64::from(x1),
                        f64::from(y1),
                        f64::from(x2),
                        f64::from(y2),
                    ),
                }
            })
            .collect())
    }

    /// Greedy per-class suppression, highest confidence first.
    fn nms(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }
            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && iou(k, &candidate) > self.iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// Label for a class id, `class_{id}` when the table has no entry.
pub fn class_label(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id))
}

#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = ix * iy;
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
}
