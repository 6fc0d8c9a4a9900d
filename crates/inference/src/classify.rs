//! Business classification of raw detector boxes into danger tiers.

use crate::types::{ClassifiedDetection, DangerLevel, RawDetection};

/// Weights and cut-offs for the danger score.
///
/// The values are empirical and must stay in sync with existing consumers;
/// they are constants, not tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DangerThresholds {
    pub critical_confidence: f64,
    pub moderate_confidence: f64,
    pub critical_score: f64,
    pub moderate_score: f64,
    pub confidence_weight: f64,
    pub area_weight: f64,
    /// Area ratio at which the size term saturates.
    pub area_ratio_cap: f64,
}

impl Default for DangerThresholds {
    fn default() -> Self {
        Self {
            critical_confidence: 0.75,
            moderate_confidence: 0.50,
            critical_score: 0.70,
            moderate_score: 0.40,
            confidence_weight: 0.7,
            area_weight: 0.3,
            area_ratio_cap: 0.15,
        }
    }
}

/// Raw model labels with a canonical defect name. Covers pothole-only models
/// and the RDD2022 road damage classes.
const CLASS_LABEL_MAP: &[(&str, &str)] = &[
    ("pothole", "pothole"),
    ("Pothole", "pothole"),
    ("D00", "longitudinal_crack"),
    ("D10", "transverse_crack"),
    ("D20", "alligator_crack"),
    ("D40", "pothole"),
];

/// Unknown labels pass through lower-cased.
pub fn canonical_defect_type(raw_label: &str) -> String {
    CLASS_LABEL_MAP
        .iter()
        .find(|(raw, _)| *raw == raw_label)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| raw_label.to_lowercase())
}

pub fn danger_score(confidence: f64, area_ratio: f64, thresholds: &DangerThresholds) -> f64 {
    let size_term = (area_ratio / thresholds.area_ratio_cap).min(1.0);
    thresholds.confidence_weight * confidence + thresholds.area_weight * size_term
}

pub fn danger_level(confidence: f64, score: f64, thresholds: &DangerThresholds) -> DangerLevel {
    if confidence >= thresholds.critical_confidence || score >= thresholds.critical_score {
        DangerLevel::Critical
    } else if confidence >= thresholds.moderate_confidence || score >= thresholds.moderate_score {
        DangerLevel::Moderate
    } else {
        DangerLevel::Minor
    }
}

pub fn classify(raw: &RawDetection, image_width: u32, image_height: u32) -> ClassifiedDetection {
    classify_with(raw, image_width, image_height, &DangerThresholds::default())
}

pub fn classify_with(
    raw: &RawDetection,
    image_width: u32,
    image_height: u32,
    thresholds: &DangerThresholds,
) -> ClassifiedDetection {
    let image_area = (u64::from(image_width) * u64::from(image_height)).max(1) as f64;
    let area_ratio = raw.bbox.area() / image_area;

    let score = danger_score(raw.confidence, area_ratio, thresholds);
    let level = danger_level(raw.confidence, score, thresholds);

    ClassifiedDetection {
        defect_type: canonical_defect_type(&raw.raw_label),
        raw_label: raw.raw_label.clone(),
        confidence: raw.confidence,
        danger_level: level,
        danger_label: level.label(),
        danger_priority: level.priority(),
        legacy_severity: level.severity(),
        bbox: raw.bbox,
    }
}
