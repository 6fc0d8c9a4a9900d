pub mod backend;
pub mod classify;
pub mod config;
pub mod errors;
pub mod hub;
pub mod processing;
pub mod rank;
pub mod resolver;
pub mod service;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use backend::{Detector, DetectorLoader, DetectorOptions};
pub use config::InferenceConfig;
pub use errors::{FetchError, InferenceError, ResolveError};
pub use hub::{HubWeightStore, WeightStore};
pub use resolver::{ModelHandle, ModelMetadata, ModelResolver, ResolutionStrategy, SourceKind};
pub use service::InferenceService;
pub use types::{
    BoundingBox, ClassifiedDetection, DangerLevel, DetectionResult, RawDetection, Severity,
};
