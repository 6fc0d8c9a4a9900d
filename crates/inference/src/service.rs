use crate::{
    classify::classify,
    config::InferenceConfig,
    errors::InferenceError,
    rank::rank,
    resolver::{ModelMetadata, ModelResolver},
    types::{ClassifiedDetection, DetectionResult, RawDetection},
};
use image::RgbImage;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

fn check_content_type(content_type: Option<&str>) -> Result<(), InferenceError> {
    let content_type = content_type.unwrap_or("none");
    if is_supported_content_type(content_type) {
        Ok(())
    } else {
        Err(InferenceError::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Media type check ignoring parameters (`; charset=...`) and case.
pub fn is_supported_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    SUPPORTED_CONTENT_TYPES.contains(&essence.as_str())
}

struct Metrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    detections: Counter<u64>,
}

fn init_metrics(meter: &Meter) -> Metrics {
    let latency_buckets = [
        0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0, 10.0, 30.0,
    ];
    Metrics {
        duration: meter
            .f64_histogram("detect_duration_seconds")
            .with_description("Time to answer one detection request (decode + infer + classify)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        requests: meter
            .u64_counter("detect_requests_total")
            .with_description("Detection requests by outcome")
            .build(),
        detections: meter
            .u64_counter("detections_total")
            .with_description("Classified detections by danger level")
            .build(),
    }
}

/// Runs one image through decode, detection, classification and ranking.
pub struct InferenceService {
    resolver: Arc<ModelResolver>,
    confidence_threshold: f64,
    validity_threshold: f64,
    inference_timeout: Duration,
    metrics: Metrics,
}

impl InferenceService {
    pub fn new(resolver: Arc<ModelResolver>, config: &InferenceConfig) -> Self {
        Self::with_meter(resolver, config, &global::meter("inference"))
    }

    pub fn with_meter(
        resolver: Arc<ModelResolver>,
        config: &InferenceConfig,
        meter: &Meter,
    ) -> Self {
        Self {
            resolver,
            confidence_threshold: config.confidence_threshold,
            validity_threshold: config.validity_threshold,
            inference_timeout: config.inference_timeout,
            metrics: init_metrics(meter),
        }
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Resolve the model ahead of the first request.
    pub async fn warmup(&self) -> Result<(), InferenceError> {
        let handle = self.resolver.resolve().await?;
        tracing::info!(
            model = %handle.path_or_uri,
            source = handle.source_kind.as_str(),
            "Model ready"
        );
        Ok(())
    }

    pub async fn model_metadata(&self) -> Result<ModelMetadata, InferenceError> {
        Ok(self.resolver.metadata().await?)
    }

    /// Check a declared media type before the body is read.
    ///
    /// Rejections are counted under the same outcome as in [`Self::handle`].
    pub fn admit(&self, content_type: Option<&str>) -> Result<(), InferenceError> {
        let admitted = check_content_type(content_type);
        if let Err(e) = &admitted {
            self.record_outcome(e.kind());
        }
        admitted
    }

    fn record_outcome(&self, outcome: &'static str) {
        self.metrics
            .requests
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    #[tracing::instrument(skip(self, image_bytes), fields(bytes = image_bytes.len()))]
    pub async fn handle(
        &self,
        image_bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<DetectionResult, InferenceError> {
        let start = Instant::now();
        let result = self.run(image_bytes, content_type).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);
        self.record_outcome(outcome);

        if let Ok(detections) = &result {
            for det in &detections.all_detections {
                self.metrics
                    .detections
                    .add(1, &[KeyValue::new("danger_level", det.danger_level.as_str())]);
            }
        }

        result
    }

    async fn run(
        &self,
        image_bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<DetectionResult, InferenceError> {
        check_content_type(content_type)?;

        let image = tokio::task::spawn_blocking(move || decode(&image_bytes))
            .await
            .map_err(|e| InferenceError::InferenceFailure(e.to_string()))??;
        let (width, height) = image.dimensions();

        let handle = self.resolver.resolve().await?;
        let detector = handle.detector();
        let floor = self.confidence_threshold;

        let predict = tokio::task::spawn_blocking(move || detector.predict(&image, floor));
        let raw: Vec<RawDetection> = tokio::time::timeout(self.inference_timeout, predict)
            .await
            .map_err(|_| InferenceError::InferenceTimeout(self.inference_timeout))?
            .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?
            .map_err(|e| InferenceError::InferenceFailure(format!("{:#}", e)))?;

        if raw.is_empty() {
            tracing::info!(width, height, "No road damage detected");
            return Ok(DetectionResult::empty());
        }

        let classified: Vec<ClassifiedDetection> =
            raw.iter().map(|r| classify(r, width, height)).collect();
        let result = DetectionResult::from_ranked(rank(classified), self.validity_threshold);

        if let Some(primary) = result.primary() {
            tracing::info!(
                defect_type = %primary.defect_type,
                raw_class = %primary.raw_label,
                confidence = primary.confidence,
                danger_level = primary.danger_level.as_str(),
                danger_label = primary.danger_label,
                count = result.all_detections.len(),
                is_valid = result.is_valid,
                "Detection complete"
            );
        }

        Ok(result)
    }
}

fn decode(bytes: &[u8]) -> Result<RgbImage, InferenceError> {
    let _s = common::span_debug!("decode_image");
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionStrategy;
    use crate::testing::{StaticDetector, StaticLoader, StaticWeightStore};
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::{
        InMemoryMetricExporter, PeriodicReader, SdkMeterProvider,
        data::{AggregatedMetrics, MetricData},
    };
    use std::collections::HashMap;

    fn test_service(meter: &Meter, detector: Arc<StaticDetector>) -> InferenceService {
        let config = InferenceConfig::default();
        let resolver = ModelResolver::with_strategies(
            vec![ResolutionStrategy::RemoteHub {
                repo_id: "org/pothole".to_string(),
                filename: "best.onnx".to_string(),
            }],
            config.confidence_threshold,
            Arc::new(StaticWeightStore::serving("/cache/best.onnx")),
            Arc::new(StaticLoader::new(detector)),
        );
        InferenceService::with_meter(Arc::new(resolver), &config, meter)
    }

    /// `detect_requests_total` by outcome, from the latest cumulative export.
    fn request_counts(exporter: &InMemoryMetricExporter) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        let exported = exporter.get_finished_metrics().unwrap();
        let Some(latest) = exported.last() else {
            return counts;
        };
        for scope in latest.scope_metrics() {
            for metric in scope.metrics() {
                if metric.name() != "detect_requests_total" {
                    continue;
                }
                if let AggregatedMetrics::U64(MetricData::Sum(sum)) = metric.data() {
                    for point in sum.data_points() {
                        for kv in point.attributes() {
                            if kv.key.as_str() == "outcome" {
                                counts.insert(kv.value.as_str().into_owned(), point.value());
                            }
                        }
                    }
                }
            }
        }
        counts
    }

    #[tokio::test]
    async fn test_rejections_are_counted_by_outcome() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter.clone()).build())
            .build();
        let detector = Arc::new(StaticDetector::new(Vec::new()));
        let service = test_service(&provider.meter("inference-test"), detector.clone());

        let err = service.admit(Some("text/plain")).unwrap_err();
        assert_eq!(err.kind(), "unsupported_media_type");
        assert!(service.admit(None).is_err());
        assert!(service.admit(Some("image/png")).is_ok());

        let err = service
            .handle(b"not an image".to_vec(), Some("image/png"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_image");

        provider.force_flush().unwrap();
        let counts = request_counts(&exporter);
        assert_eq!(counts.get("unsupported_media_type"), Some(&2));
        assert_eq!(counts.get("invalid_image"), Some(&1));
        assert_eq!(counts.len(), 2, "admitted uploads are not counted twice");
        assert_eq!(detector.calls(), 0);
    }

    #[test]
    fn test_supported_content_types() {
        assert!(is_supported_content_type("image/jpeg"));
        assert!(is_supported_content_type("image/png"));
        assert!(is_supported_content_type("image/webp"));
        assert!(is_supported_content_type("IMAGE/JPEG"));
        assert!(is_supported_content_type("image/png; charset=binary"));
        assert!(is_supported_content_type(" image/webp "));
    }

    #[test]
    fn test_unsupported_content_types() {
        assert!(!is_supported_content_type("text/plain"));
        assert!(!is_supported_content_type("image/gif"));
        assert!(!is_supported_content_type("image/jpg"));
        assert!(!is_supported_content_type(""));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), "invalid_image");
        assert!(err.is_client_error());
    }
}
