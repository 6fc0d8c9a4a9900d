use crate::types::ClassifiedDetection;
use std::cmp::Ordering;

/// Most dangerous first; among equal tiers, most confident first.
pub fn compare_danger(a: &ClassifiedDetection, b: &ClassifiedDetection) -> Ordering {
    a.danger_priority
        .cmp(&b.danger_priority)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

/// Stable: exact ties keep detector emission order.
pub fn rank(mut detections: Vec<ClassifiedDetection>) -> Vec<ClassifiedDetection> {
    detections.sort_by(compare_danger);
    detections
}

pub fn primary(ranked: &[ClassifiedDetection]) -> Option<&ClassifiedDetection> {
    ranked.first()
}
