use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use common::Environment;

pub const DEFAULT_LOCAL_FINETUNED_MODEL: &str = "models/pothole_finetuned.onnx";
pub const DEFAULT_FALLBACK_MODEL: &str = "models/yolov8n.onnx";
pub const DEFAULT_HF_REPO: &str = "Harisanth/Pothole-Finetuned-YOLOv8";
pub const DEFAULT_HF_FILENAME: &str = "best.onnx";
pub const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    /// Detector floor: boxes below it are dropped before classification.
    pub confidence_threshold: f64,
    /// Primary confidence needed for `is_valid`.
    pub validity_threshold: f64,
    pub local_finetuned_model: PathBuf,
    pub model_path_override: Option<PathBuf>,
    pub hf_repo: String,
    pub hf_filename: String,
    pub hf_endpoint: String,
    pub model_cache_dir: PathBuf,
    pub fallback_model: PathBuf,
    pub input_size: (u32, u32),
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub inference_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            validity_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            local_finetuned_model: PathBuf::from(DEFAULT_LOCAL_FINETUNED_MODEL),
            model_path_override: None,
            hf_repo: DEFAULT_HF_REPO.to_string(),
            hf_filename: DEFAULT_HF_FILENAME.to_string(),
            hf_endpoint: DEFAULT_HF_ENDPOINT.to_string(),
            model_cache_dir: PathBuf::from(".cache/models"),
            fallback_model: PathBuf::from(DEFAULT_FALLBACK_MODEL),
            input_size: preprocess::DEFAULT_INPUT_SIZE,
            iou_threshold: 0.7,
            max_detections: 300,
            inference_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Read once at startup; changing a variable requires a restart.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let confidence_threshold =
            parse_env("CONFIDENCE_THRESHOLD", defaults.confidence_threshold);
        let validity_threshold = parse_env("VALIDITY_THRESHOLD", confidence_threshold);

        for (name, value) in [
            ("CONFIDENCE_THRESHOLD", confidence_threshold),
            ("VALIDITY_THRESHOLD", validity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        let model_path_override = env::var("MODEL_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let input_edge = parse_env("INPUT_SIZE", defaults.input_size.0);
        if input_edge == 0 {
            anyhow::bail!("INPUT_SIZE must be positive");
        }

        Ok(Self {
            environment: Environment::from_env(),
            confidence_threshold,
            validity_threshold,
            local_finetuned_model: env::var("LOCAL_FINETUNED_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_finetuned_model),
            model_path_override,
            hf_repo: env::var("HF_REPO").unwrap_or(defaults.hf_repo),
            hf_filename: env::var("HF_FILENAME").unwrap_or(defaults.hf_filename),
            hf_endpoint: env::var("HF_ENDPOINT").unwrap_or(defaults.hf_endpoint),
            model_cache_dir: env::var("MODEL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_cache_dir),
            fallback_model: env::var("FALLBACK_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_model),
            input_size: (input_edge, input_edge),
            iou_threshold: parse_env("IOU_THRESHOLD", defaults.iou_threshold),
            max_detections: parse_env("MAX_DETECTIONS", defaults.max_detections),
            inference_timeout: Duration::from_millis(parse_env(
                "INFERENCE_TIMEOUT_MS",
                defaults.inference_timeout.as_millis() as u64,
            )),
            fetch_timeout: Duration::from_secs(parse_env(
                "HF_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
        })
    }

    /// `hf://{repo}/{filename}` identifier reported for hub weights.
    pub fn hub_uri(&self) -> String {
        format!("hf://{}/{}", self.hf_repo, self.hf_filename)
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
