//! In-memory detector, loader and weight store for exercising the pipeline
//! without ONNX Runtime or network access.

use crate::backend::{Detector, DetectorLoader};
use crate::errors::FetchError;
use crate::hub::WeightStore;
use crate::types::{BoundingBox, RawDetection};
use async_trait::async_trait;
use image::RgbImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns a fixed set of detections, filtered by the confidence floor.
pub struct StaticDetector {
    detections: Vec<RawDetection>,
    class_names: Vec<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            class_names: vec!["pothole".to_string()],
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Block the calling thread this long on every prediction.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for StaticDetector {
    fn predict(
        &self,
        _image: &RgbImage,
        confidence_floor: f64,
    ) -> anyhow::Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_floor)
            .cloned()
            .collect())
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Hands out one shared detector for every path except those marked failing.
pub struct StaticLoader {
    detector: Arc<StaticDetector>,
    failing_paths: HashSet<PathBuf>,
    loads: AtomicUsize,
}

impl StaticLoader {
    pub fn new(detector: Arc<StaticDetector>) -> Self {
        Self {
            detector,
            failing_paths: HashSet::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Loading `path` fails as if the weights were corrupt.
    pub fn fail_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_paths.insert(path.into());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DetectorLoader for StaticLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn Detector>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing_paths.contains(path) {
            anyhow::bail!("corrupt weights at {}", path.display());
        }
        let detector: Arc<dyn Detector> = self.detector.clone();
        Ok(detector)
    }
}

/// Weight store that either serves one path or is unavailable.
pub struct StaticWeightStore {
    path: Option<PathBuf>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl StaticWeightStore {
    pub fn serving(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            path: None,
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeightStore for StaticWeightStore {
    async fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.path.clone().ok_or_else(|| FetchError::Status {
            status: reqwest::StatusCode::NOT_FOUND,
            url: format!("test://{}/{}", repo_id, filename),
        })
    }
}

pub fn raw_detection(label: &str, confidence: f64, bbox: [f64; 4]) -> RawDetection {
    RawDetection {
        raw_label: label.to_string(),
        confidence,
        bbox: BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
    }
}
