use serde::Serialize;

/// Axis-aligned box in original image pixel coordinates `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Area in square pixels. Inverted or degenerate boxes have area 0.
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One box exactly as the detector emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub raw_label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    Critical,
    Moderate,
    Minor,
}

impl DangerLevel {
    /// Most dangerous first.
    pub const ALL: [DangerLevel; 3] = [
        DangerLevel::Critical,
        DangerLevel::Moderate,
        DangerLevel::Minor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DangerLevel::Critical => "critical",
            DangerLevel::Moderate => "moderate",
            DangerLevel::Minor => "minor",
        }
    }

    /// Lower is more dangerous.
    pub fn priority(&self) -> u8 {
        match self {
            DangerLevel::Critical => 1,
            DangerLevel::Moderate => 2,
            DangerLevel::Minor => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DangerLevel::Critical => "Critical — Immediate Danger",
            DangerLevel::Moderate => "Moderate — Needs Attention",
            DangerLevel::Minor => "Minor — Monitor",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DangerLevel::Critical => Severity::High,
            DangerLevel::Moderate => Severity::Medium,
            DangerLevel::Minor => Severity::Low,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(DangerLevel::as_str).collect()
    }
}

/// Three-level naming kept for consumers that predate danger tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDetection {
    pub defect_type: String,
    pub raw_label: String,
    pub confidence: f64,
    pub danger_level: DangerLevel,
    pub danger_label: &'static str,
    pub danger_priority: u8,
    pub legacy_severity: Severity,
    pub bbox: BoundingBox,
}

/// Ranked outcome of one request.
///
/// The primary detection is not stored separately: it is always the head of
/// `all_detections`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub all_detections: Vec<ClassifiedDetection>,
    pub is_valid: bool,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self {
            all_detections: Vec::new(),
            is_valid: false,
        }
    }

    /// `ranked` must already be ordered most dangerous first.
    pub fn from_ranked(ranked: Vec<ClassifiedDetection>, validity_threshold: f64) -> Self {
        let is_valid = ranked
            .first()
            .is_some_and(|primary| primary.confidence >= validity_threshold);
        Self {
            all_detections: ranked,
            is_valid,
        }
    }

    pub fn primary(&self) -> Option<&ClassifiedDetection> {
        self.all_detections.first()
    }
}
