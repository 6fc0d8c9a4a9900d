use crate::config::InferenceConfig;
use crate::errors::FetchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source of remotely published model weights.
#[async_trait]
pub trait WeightStore: Send + Sync {
    /// Return a local path holding `filename` from `repo_id`, downloading
    /// it when not already cached.
    async fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, FetchError>;
}

/// Hugging Face Hub client with an on-disk cache.
///
/// Files land at `{cache_dir}/{repo_id with '/' -> '--'}/{filename}` and are
/// written through a temporary file so a partial download never looks cached.
pub struct HubWeightStore {
    client: reqwest::Client,
    endpoint: String,
    cache_dir: PathBuf,
    timeout: Duration,
}

impl HubWeightStore {
    pub fn new(
        endpoint: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
            timeout,
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, FetchError> {
        Self::new(
            config.hf_endpoint.clone(),
            config.model_cache_dir.clone(),
            config.fetch_timeout,
        )
    }

    pub fn cache_path(&self, repo_id: &str, filename: &str) -> PathBuf {
        self.cache_dir
            .join(repo_id.replace('/', "--"))
            .join(filename)
    }

    pub fn resolve_url(&self, repo_id: &str, filename: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.endpoint, repo_id, filename)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_err(e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("partial");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, dest).await?;

        Ok(bytes.len() as u64)
    }

    fn map_err(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl WeightStore for HubWeightStore {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, FetchError> {
        let dest = self.cache_path(repo_id, filename);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            tracing::debug!(path = %dest.display(), "Using cached weights");
            return Ok(dest);
        }

        let url = self.resolve_url(repo_id, filename);
        tracing::info!(url = %url, "Downloading weights");
        let size = self.download(&url, &dest).await?;
        tracing::info!(path = %dest.display(), size, "Weights downloaded");

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_cache_layout_and_url() {
        let store = HubWeightStore::new(
            "https://huggingface.co/",
            "/tmp/cache",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            store.cache_path("Harisanth/Pothole-Finetuned-YOLOv8", "best.onnx"),
            PathBuf::from("/tmp/cache/Harisanth--Pothole-Finetuned-YOLOv8/best.onnx")
        );
        assert_eq!(
            store.resolve_url("Harisanth/Pothole-Finetuned-YOLOv8", "best.onnx"),
            "https://huggingface.co/Harisanth/Pothole-Finetuned-YOLOv8/resolve/main/best.onnx"
        );
    }

    #[tokio::test]
    async fn test_cached_file_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        // Unroutable endpoint: any network access would fail
        let store =
            HubWeightStore::new("http://127.0.0.1:9", dir.path(), Duration::from_secs(1)).unwrap();

        let cached = store.cache_path("org/model", "best.onnx");
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, b"weights").unwrap();

        let path = store.fetch("org/model", "best.onnx").await.unwrap();
        assert_eq!(path, cached);
    }

    /// Minimal hub: serves `weights` for `org/model`, 404 for anything else.
    async fn serve_hub() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => read += n,
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]);
                let response = if request.starts_with("GET /org/model/resolve/main/best.onnx ") {
                    "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nweights"
                } else {
                    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (endpoint, requests)
    }

    #[tokio::test]
    async fn test_download_lands_in_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, requests) = serve_hub().await;
        let store = HubWeightStore::new(endpoint, dir.path(), Duration::from_secs(5)).unwrap();

        let path = store.fetch("org/model", "best.onnx").await.unwrap();
        assert_eq!(path, dir.path().join("org--model").join("best.onnx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"weights");
        assert!(
            !path.with_extension("partial").exists(),
            "temporary file is renamed into place"
        );
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        let again = store.fetch("org/model", "best.onnx").await.unwrap();
        assert_eq!(again, path);
        assert_eq!(requests.load(Ordering::SeqCst), 1, "cached file is not fetched again");
    }

    #[tokio::test]
    async fn test_missing_file_is_status_error() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, requests) = serve_hub().await;
        let store = HubWeightStore::new(endpoint, dir.path(), Duration::from_secs(5)).unwrap();

        let err = store.fetch("org/missing", "best.onnx").await.unwrap_err();
        match err {
            FetchError::Status { status, url } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(url.ends_with("/org/missing/resolve/main/best.onnx"), "url = {url}");
            }
            other => panic!("expected a status error, got {other:?}"),
        }

        let cached = store.cache_path("org/missing", "best.onnx");
        assert!(!cached.exists());
        assert!(!cached.with_extension("partial").exists());
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_hub_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            HubWeightStore::new("http://127.0.0.1:9", dir.path(), Duration::from_secs(2)).unwrap();

        let result = store.fetch("org/model", "best.onnx").await;
        assert!(result.is_err());
        assert!(
            !store.cache_path("org/model", "best.onnx").exists(),
            "failed download must not leave a cached file"
        );
    }
}
