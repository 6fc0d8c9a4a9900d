//! Picks the weights to serve and loads them exactly once per process.

use crate::backend::{Detector, DetectorLoader};
use crate::config::InferenceConfig;
use crate::errors::ResolveError;
use crate::hub::WeightStore;
use crate::types::DangerLevel;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    LocalFinetuned,
    ExplicitOverride,
    RemoteHub,
    FallbackGeneric,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::LocalFinetuned => "local-finetuned",
            SourceKind::ExplicitOverride => "explicit-override",
            SourceKind::RemoteHub => "remote-hub",
            SourceKind::FallbackGeneric => "fallback-generic",
        }
    }
}

/// The model serving this process.
pub struct ModelHandle {
    pub path_or_uri: String,
    pub source_kind: SourceKind,
    pub class_names: Vec<String>,
    detector: Arc<dyn Detector>,
}

impl ModelHandle {
    pub fn detector(&self) -> Arc<dyn Detector> {
        Arc::clone(&self.detector)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("path_or_uri", &self.path_or_uri)
            .field("source_kind", &self.source_kind)
            .field("class_names", &self.class_names)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub path: String,
    pub source_kind: SourceKind,
    /// The local fine-tuned weights file is present on disk.
    pub is_custom_trained: bool,
    pub class_names: Vec<String>,
    pub confidence_threshold: f64,
    pub danger_level_names: Vec<&'static str>,
}

/// Weights found by one level of the chain, ready to load.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedWeights {
    pub path: PathBuf,
    pub path_or_uri: String,
}

impl LocatedWeights {
    fn local(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            path_or_uri: path.display().to_string(),
        }
    }
}

/// One level of the resolution chain, tried in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStrategy {
    LocalFinetuned(PathBuf),
    ExplicitOverride(Option<PathBuf>),
    RemoteHub { repo_id: String, filename: String },
    FallbackGeneric(PathBuf),
}

impl ResolutionStrategy {
    /// Default order: local fine-tuned, `MODEL_PATH`, hub, generic fallback.
    pub fn chain(config: &InferenceConfig) -> Vec<Self> {
        vec![
            ResolutionStrategy::LocalFinetuned(config.local_finetuned_model.clone()),
            ResolutionStrategy::ExplicitOverride(config.model_path_override.clone()),
            ResolutionStrategy::RemoteHub {
                repo_id: config.hf_repo.clone(),
                filename: config.hf_filename.clone(),
            },
            ResolutionStrategy::FallbackGeneric(config.fallback_model.clone()),
        ]
    }

    pub fn source_kind(&self) -> SourceKind {
        match self {
            ResolutionStrategy::LocalFinetuned(_) => SourceKind::LocalFinetuned,
            ResolutionStrategy::ExplicitOverride(_) => SourceKind::ExplicitOverride,
            ResolutionStrategy::RemoteHub { .. } => SourceKind::RemoteHub,
            ResolutionStrategy::FallbackGeneric(_) => SourceKind::FallbackGeneric,
        }
    }

    pub async fn locate(&self, store: &dyn WeightStore) -> Result<LocatedWeights, String> {
        match self {
            ResolutionStrategy::LocalFinetuned(path) | ResolutionStrategy::FallbackGeneric(path) => {
                existing(path).map(LocatedWeights::local)
            }
            ResolutionStrategy::ExplicitOverride(None) => Err("MODEL_PATH not set".to_string()),
            ResolutionStrategy::ExplicitOverride(Some(path)) => {
                existing(path).map(LocatedWeights::local)
            }
            ResolutionStrategy::RemoteHub { repo_id, filename } => store
                .fetch(repo_id, filename)
                .await
                .map(|path| LocatedWeights {
                    path,
                    path_or_uri: format!("hf://{}/{}", repo_id, filename),
                })
                .map_err(|e| e.to_string()),
        }
    }
}

fn existing(path: &Path) -> Result<&Path, String> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{} not found", path.display()))
    }
}

pub struct ModelResolver {
    strategies: Vec<ResolutionStrategy>,
    store: Arc<dyn WeightStore>,
    loader: Arc<dyn DetectorLoader>,
    confidence_threshold: f64,
    handle: OnceCell<Arc<ModelHandle>>,
}

impl ModelResolver {
    pub fn new(
        config: &InferenceConfig,
        store: Arc<dyn WeightStore>,
        loader: Arc<dyn DetectorLoader>,
    ) -> Self {
        Self::with_strategies(
            ResolutionStrategy::chain(config),
            config.confidence_threshold,
            store,
            loader,
        )
    }

    pub fn with_strategies(
        strategies: Vec<ResolutionStrategy>,
        confidence_threshold: f64,
        store: Arc<dyn WeightStore>,
        loader: Arc<dyn DetectorLoader>,
    ) -> Self {
        Self {
            strategies,
            store,
            loader,
            confidence_threshold,
            handle: OnceCell::new(),
        }
    }

    /// Resolve and load the model, or return the one already loaded.
    ///
    /// Concurrent first callers share a single resolution. On failure the
    /// cell stays empty and the next call runs the chain again.
    pub async fn resolve(&self) -> Result<Arc<ModelHandle>, ResolveError> {
        self.handle
            .get_or_try_init(|| self.run_chain())
            .await
            .map(Arc::clone)
    }

    /// The handle if resolution already succeeded.
    pub fn resolved(&self) -> Option<Arc<ModelHandle>> {
        self.handle.get().cloned()
    }

    pub async fn metadata(&self) -> Result<ModelMetadata, ResolveError> {
        let handle = self.resolve().await?;
        Ok(ModelMetadata {
            path: handle.path_or_uri.clone(),
            source_kind: handle.source_kind,
            is_custom_trained: self.local_finetuned_present(),
            class_names: handle.class_names.clone(),
            confidence_threshold: self.confidence_threshold,
            danger_level_names: DangerLevel::names(),
        })
    }

    fn local_finetuned_present(&self) -> bool {
        self.strategies.iter().any(|strategy| match strategy {
            ResolutionStrategy::LocalFinetuned(path) => path.is_file(),
            _ => false,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn run_chain(&self) -> Result<Arc<ModelHandle>, ResolveError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.source_kind();

            let located = match strategy.locate(self.store.as_ref()).await {
                Ok(located) => located,
                Err(reason) => {
                    tracing::info!(source = kind.as_str(), reason = %reason, "Model source skipped");
                    failures.push(format!("{}: {}", kind.as_str(), reason));
                    continue;
                }
            };

            let loader = Arc::clone(&self.loader);
            let path = located.path.clone();
            let loaded = tokio::task::spawn_blocking(move || loader.load(&path))
                .await
                .map_err(anyhow::Error::from)
                .and_then(|result| result);

            match loaded {
                Ok(detector) => {
                    let class_names = detector.class_names().to_vec();
                    tracing::info!(
                        source = kind.as_str(),
                        model = %located.path_or_uri,
                        classes = ?class_names,
                        "Model resolved"
                    );
                    return Ok(Arc::new(ModelHandle {
                        path_or_uri: located.path_or_uri,
                        source_kind: kind,
                        class_names,
                        detector,
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        source = kind.as_str(),
                        model = %located.path_or_uri,
                        error = %e,
                        "Model failed to load, trying next source"
                    );
                    failures.push(format!("{}: {}", kind.as_str(), e));
                }
            }
        }

        tracing::error!(failures = ?failures, "Every model source failed");
        Err(ResolveError::Exhausted { failures })
    }
}
