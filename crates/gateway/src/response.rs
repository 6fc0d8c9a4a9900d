//! JSON bodies returned by the HTTP API.

use inference::{ClassifiedDetection, DetectionResult, ModelMetadata, SourceKind};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DetectionBody {
    pub defect_type: String,
    pub raw_class: String,
    pub confidence: f64,
    pub danger_level: &'static str,
    pub danger_label: &'static str,
    pub danger_priority: u8,
    pub severity: &'static str,
    pub bbox: [f64; 4],
}

impl From<&ClassifiedDetection> for DetectionBody {
    fn from(det: &ClassifiedDetection) -> Self {
        Self {
            defect_type: det.defect_type.clone(),
            raw_class: det.raw_label.clone(),
            confidence: round_to(det.confidence, 4),
            danger_level: det.danger_level.as_str(),
            danger_label: det.danger_label,
            danger_priority: det.danger_priority,
            severity: det.legacy_severity.as_str(),
            bbox: det.bbox.to_array().map(|v| round_to(v, 2)),
        }
    }
}

/// Primary detection fields flattened at the top level, `null` when nothing
/// was detected.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub defect_type: Option<String>,
    pub raw_class: Option<String>,
    pub confidence: Option<f64>,
    pub danger_level: Option<&'static str>,
    pub danger_label: Option<&'static str>,
    pub danger_priority: Option<u8>,
    pub severity: Option<&'static str>,
    pub bbox: Option<[f64; 4]>,
    pub is_valid: bool,
    pub all_detections: Vec<DetectionBody>,
}

impl From<&DetectionResult> for DetectResponse {
    fn from(result: &DetectionResult) -> Self {
        let all_detections: Vec<DetectionBody> =
            result.all_detections.iter().map(DetectionBody::from).collect();
        let primary = all_detections.first();

        Self {
            defect_type: primary.map(|p| p.defect_type.clone()),
            raw_class: primary.map(|p| p.raw_class.clone()),
            confidence: primary.map(|p| p.confidence),
            danger_level: primary.map(|p| p.danger_level),
            danger_label: primary.map(|p| p.danger_label),
            danger_priority: primary.map(|p| p.danger_priority),
            severity: primary.map(|p| p.severity),
            bbox: primary.map(|p| p.bbox),
            is_valid: result.is_valid,
            all_detections,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub class_names: Vec<String>,
    pub danger_levels: Vec<&'static str>,
}

impl From<ModelMetadata> for HealthResponse {
    fn from(meta: ModelMetadata) -> Self {
        Self {
            status: "ok",
            model: meta.path,
            class_names: meta.class_names,
            danger_levels: meta.danger_level_names,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    pub source: SourceKind,
    pub is_custom_trained: bool,
    pub class_names: Vec<String>,
    pub confidence_threshold: f64,
    pub danger_levels: Vec<&'static str>,
}

impl From<ModelMetadata> for ModelInfoResponse {
    fn from(meta: ModelMetadata) -> Self {
        Self {
            model_path: meta.path,
            source: meta.source_kind,
            is_custom_trained: meta.is_custom_trained,
            class_names: meta.class_names,
            confidence_threshold: meta.confidence_threshold,
            danger_levels: meta.danger_level_names,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::{BoundingBox, DangerLevel};

    fn detection(confidence: f64, bbox: BoundingBox) -> ClassifiedDetection {
        let level = DangerLevel::Moderate;
        ClassifiedDetection {
            defect_type: "pothole".into(),
            raw_label: "Pothole".into(),
            confidence,
            danger_level: level,
            danger_label: level.label(),
            danger_priority: level.priority(),
            legacy_severity: level.severity(),
            bbox,
        }
    }

    #[test]
    fn test_rounding() {
        let body = DetectionBody::from(&detection(
            0.612345,
            BoundingBox::new(10.126, 20.0, 30.999, 40.004),
        ));
        assert_eq!(body.confidence, 0.6123);
        assert_eq!(body.bbox, [10.13, 20.0, 31.0, 40.0]);
        assert_eq!(body.raw_class, "Pothole");
        assert_eq!(body.severity, "medium");
    }

    #[test]
    fn test_empty_result_serializes_nulls() {
        let body = DetectResponse::from(&DetectionResult::empty());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["defect_type"].is_null());
        assert!(json["confidence"].is_null());
        assert!(json["bbox"].is_null());
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["all_detections"], serde_json::json!([]));
    }

    #[test]
    fn test_primary_fields_mirror_head() {
        let result = DetectionResult::from_ranked(
            vec![
                detection(0.7, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
                detection(0.6, BoundingBox::new(1.0, 1.0, 2.0, 2.0)),
            ],
            0.15,
        );
        let json = serde_json::to_value(DetectResponse::from(&result)).unwrap();
        assert_eq!(json["confidence"], json["all_detections"][0]["confidence"]);
        assert_eq!(json["bbox"], json["all_detections"][0]["bbox"]);
        assert_eq!(json["danger_level"], "moderate");
        assert_eq!(json["danger_priority"], 2);
        assert_eq!(json["is_valid"], true);
    }
}
