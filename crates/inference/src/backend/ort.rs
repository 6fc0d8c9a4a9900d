use super::{Detector, DetectorLoader, DetectorOptions};
use crate::processing::{YoloPostProcessor, parse_class_names};
use crate::types::RawDetection;
use image::RgbImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use preprocess::LetterboxPreProcessor;
use std::path::Path;
use std::sync::{Arc, Mutex};

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        if cfg!(feature = "cuda") {
            ExecutionProvider::Cuda
        } else {
            ExecutionProvider::Cpu
        }
    }
}

struct OrtSession {
    session: Session,
    preprocessor: LetterboxPreProcessor,
}

/// YOLOv8 ONNX detector. The session is serialized behind a mutex since
/// running it requires exclusive access.
pub struct OrtDetector {
    inner: Mutex<OrtSession>,
    class_names: Vec<String>,
    postprocessor: YoloPostProcessor,
}

impl OrtDetector {
    pub fn load(
        path: &Path,
        options: DetectorOptions,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[cfg_attr(not(feature = "cuda"), allow(unused_mut))]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is off");
            }
            ExecutionProvider::Cpu => {
                tracing::debug!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;
        let class_names = read_class_names(&session);

        tracing::info!(
            path = %path.display(),
            classes = class_names.len(),
            "Model loaded"
        );

        Ok(Self {
            inner: Mutex::new(OrtSession {
                session,
                preprocessor: LetterboxPreProcessor::new(options.input_size),
            }),
            class_names,
            postprocessor: YoloPostProcessor::new(options.iou_threshold, options.max_detections),
        })
    }
}

fn read_class_names(session: &Session) -> Vec<String> {
    let names = session
        .metadata()
        .ok()
        .and_then(|metadata| metadata.custom("names"))
        .and_then(|raw| parse_class_names(&raw));

    match names {
        Some(names) => names,
        None => {
            tracing::warn!("Model carries no `names` metadata, labels fall back to class ids");
            Vec::new()
        }
    }
}

impl Detector for OrtDetector {
    fn predict(
        &self,
        image: &RgbImage,
        confidence_floor: f64,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
        let OrtSession {
            session,
            preprocessor,
        } = &mut *guard;

        let input = preprocessor.preprocess(image.as_raw(), image.width(), image.height())?;

        let outputs = session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(input.tensor.view())?
        ])?;
        let raw = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        self.postprocessor
            .decode(&raw, &input.transform, &self.class_names, confidence_floor)
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Loads ONNX weights into [`OrtDetector`]s.
#[derive(Debug, Clone, Copy)]
pub struct OrtLoader {
    options: DetectorOptions,
    provider: ExecutionProvider,
}

impl OrtLoader {
    pub fn new(options: DetectorOptions, provider: ExecutionProvider) -> Self {
        Self { options, provider }
    }

    pub fn from_config(config: &crate::config::InferenceConfig) -> Self {
        Self::new(
            DetectorOptions::from_config(config),
            ExecutionProvider::default(),
        )
    }
}

impl DetectorLoader for OrtLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn Detector>> {
        let detector = OrtDetector::load(path, self.options, self.provider)?;
        Ok(Arc::new(detector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weights_fail_to_load() {
        let loader = OrtLoader::new(DetectorOptions::default(), ExecutionProvider::Cpu);
        let result = loader.load(Path::new("/nonexistent/weights.onnx"));
        assert!(result.is_err());
    }
}
