//! Startup provisioning of the model and lookup-table artifacts

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::engine::ModelBackend;
use crate::error::{Error, Result};

/// Default local cache directory.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

const REMOTE_BASE: &str = "https://drive.google.com";

const MODEL_FILE_ID: &str = "1lxKcXZND6ezM1h5byVwrbXHcy7y6W7fs";
const CLASSES_FILE_ID: &str = "1T6wpzmwec63DCvjXvVsrv6T3EI4TUMIe";
const CURE_FILE_ID: &str = "1zTP-BZ4cObwzsX0Xmh_hwkvUcTzF2HGa";

const MODEL_FILE_STEM: &str = "plant_disease";
const CLASSES_FILE: &str = "list_of_classes.txt";
const CURE_FILE: &str = "cure.json";

/// The model download is over a hundred megabytes on a cold host.
const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Local asset directory plus the remote endpoint the files come from.
///
/// `provision` is idempotent: a file already on disk is never fetched again,
/// so restarts after one successful boot need no network at all. There is no
/// retry and no partial-success mode; the caller treats any error as fatal.
pub struct AssetStore {
    dir: PathBuf,
    remote_base: String,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote_base: REMOTE_BASE.to_string(),
        }
    }

    /// Point fetches at a different host. Tests use a local stub server.
    pub fn with_remote_base(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            remote_base: base.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path of the model artifact for the given backend.
    pub fn model_path(&self, backend: ModelBackend) -> PathBuf {
        self.dir
            .join(format!("{MODEL_FILE_STEM}.{}", backend.extension()))
    }

    pub fn classes_path(&self) -> PathBuf {
        self.dir.join(CLASSES_FILE)
    }

    pub fn cure_path(&self) -> PathBuf {
        self.dir.join(CURE_FILE)
    }

    /// Fetch whichever of the three assets is missing locally.
    pub async fn provision(&self, backend: ModelBackend) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Provision {
                asset: self.dir.display().to_string(),
                reason: format!("cannot create asset directory: {e}"),
            })?;
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Provision {
                asset: "http client".to_string(),
                reason: e.to_string(),
            })?;

        let wanted = [
            (self.model_path(backend), MODEL_FILE_ID),
            (self.classes_path(), CLASSES_FILE_ID),
            (self.cure_path(), CURE_FILE_ID),
        ];
        for (path, file_id) in wanted {
            self.fetch_if_missing(&client, &path, file_id).await?;
        }
        Ok(())
    }

    async fn fetch_if_missing(
        &self,
        client: &reqwest::Client,
        path: &Path,
        file_id: &str,
    ) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if path.exists() {
            info!("asset {name} cached, skipping");
            return Ok(());
        }

        let url = format!("{}/uc?id={file_id}", self.remote_base);
        info!("downloading {name}");
        let response = client.get(&url).send().await.map_err(|e| Error::Provision {
            asset: name.clone(),
            reason: format!("GET {url} failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(Error::Provision {
                asset: name,
                reason: format!("HTTP {} from {url}", response.status()),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Error::Provision {
            asset: name.clone(),
            reason: format!("read of {url} failed: {e}"),
        })?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| Error::Provision {
                asset: name.clone(),
                reason: format!("write to {} failed: {e}", path.display()),
            })?;
        info!("downloaded {name} ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::Router;

    use super::*;

    async fn stub_asset(
        State(hits): State<Arc<AtomicUsize>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> String {
        hits.fetch_add(1, Ordering::SeqCst);
        format!(
            "payload-{}",
            params.get("id").map(String::as_str).unwrap_or("")
        )
    }

    async fn spawn_stub(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn spawn_counting_stub(hits: Arc<AtomicUsize>) -> SocketAddr {
        spawn_stub(Router::new().route("/uc", get(stub_asset)).with_state(hits)).await
    }

    #[tokio::test]
    async fn provision_fetches_all_assets_then_caches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_counting_stub(hits.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::with_remote_base(dir.path(), format!("http://{addr}"));

        store.provision(ModelBackend::Tflite).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(store.model_path(ModelBackend::Tflite).exists());
        assert!(store.classes_path().exists());
        assert!(store.cure_path().exists());
        let body = std::fs::read_to_string(store.cure_path()).unwrap();
        assert_eq!(body, format!("payload-{CURE_FILE_ID}"));

        // second pass finds everything on disk
        store.provision(ModelBackend::Tflite).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn preseeded_files_are_never_refetched() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_counting_stub(hits.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CLASSES_FILE), "['a']").unwrap();
        let store = AssetStore::with_remote_base(dir.path(), format!("http://{addr}"));

        store.provision(ModelBackend::Onnx).await.unwrap();
        // only the model and the cure table were missing
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(
            std::fs::read_to_string(store.classes_path()).unwrap(),
            "['a']"
        );
    }

    #[tokio::test]
    async fn remote_error_status_is_fatal() {
        // no /uc route, so every fetch sees a 404
        let addr = spawn_stub(Router::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::with_remote_base(dir.path(), format!("http://{addr}"));

        let err = store.provision(ModelBackend::Tflite).await.unwrap_err();
        assert!(matches!(err, Error::Provision { .. }));
    }

    #[test]
    fn model_path_tracks_backend() {
        let store = AssetStore::new("assets");
        assert_eq!(
            store.model_path(ModelBackend::Onnx),
            PathBuf::from("assets/plant_disease.onnx")
        );
        assert_eq!(
            store.model_path(ModelBackend::Tflite),
            PathBuf::from("assets/plant_disease.tflite")
        );
    }
}
