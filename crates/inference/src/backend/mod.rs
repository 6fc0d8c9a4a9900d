use crate::types::RawDetection;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded object detector.
///
/// Implementations must be safe to share between concurrent requests.
pub trait Detector: Send + Sync {
    /// Run the model on a decoded image and return every box at or above
    /// `confidence_floor`, in original image pixel coordinates.
    fn predict(&self, image: &RgbImage, confidence_floor: f64)
    -> anyhow::Result<Vec<RawDetection>>;

    /// Class id to label table the weights were trained with.
    fn class_names(&self) -> &[String];
}

/// Turns a weights file into a ready detector.
pub trait DetectorLoader: Send + Sync {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn Detector>>;
}

/// Model-independent decode parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    pub input_size: (u32, u32),
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl DetectorOptions {
    pub fn from_config(config: &crate::config::InferenceConfig) -> Self {
        Self {
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        }
    }
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::from_config(&crate::config::InferenceConfig::default())
    }
}
