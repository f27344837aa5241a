use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::catalog::Catalog;
use crate::core::embeddings::{Architecture, Embedder};
use crate::core::input::build_client;
use crate::error::{AppError, Result};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Catalog file with precomputed embeddings
    pub catalog_path: PathBuf,
    /// Directory holding the catalog images
    pub image_dir: PathBuf,
    /// URL prefix the image directory is served under
    pub image_mount: String,
    /// Pretrained weights for the feature extractor
    pub weights_path: PathBuf,
    /// Feature extractor backbone
    pub arch: Architecture,
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Number of results when the request does not ask for a count
    pub default_top_k: usize,
    /// Upper bound on fetching an image by URL
    pub fetch_timeout: Duration,
    /// Maximum size in bytes of an uploaded file or a downloaded image.
    /// Request bodies may exceed it by the multipart framing allowance.
    pub max_upload_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("products.json"),
            image_dir: PathBuf::from("dataset"),
            image_mount: String::from("/dataset"),
            weights_path: PathBuf::from("resnet18.ot"),
            arch: Architecture::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            default_top_k: 10,
            fetch_timeout: Duration::from_secs(5),
            max_upload_size: 20 * 1024 * 1024, // 20MB
        }
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e))),
        _ => Ok(None),
    }
}

impl Config {
    /// Build a configuration from `MATCHER_*` environment variables, loading
    /// `.env` first if present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(v) = env_var("MATCHER_CATALOG")? {
            config.catalog_path = v;
        }
        if let Some(v) = env_var("MATCHER_IMAGE_DIR")? {
            config.image_dir = v;
        }
        if let Some(v) = env_var("MATCHER_WEIGHTS")? {
            config.weights_path = v;
        }
        if let Some(v) = env_var("MATCHER_ARCH")? {
            config.arch = v;
        }
        if let Some(v) = env_var("MATCHER_BIND")? {
            config.bind_addr = v;
        }
        if let Some(v) = env_var("MATCHER_DEFAULT_TOP_K")? {
            config.default_top_k = v;
        }
        if let Some(secs) = env_var::<u64>("MATCHER_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = env_var("MATCHER_MAX_UPLOAD_BYTES")? {
            config.max_upload_size = v;
        }

        Ok(config)
    }
}

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Read-only product catalog
    pub catalog: Arc<Catalog>,
    /// Feature extractor used for query images
    pub embedder: Arc<dyn Embedder>,
    /// Client for image-by-URL queries
    pub http: reqwest::Client,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("catalog_size", &self.catalog.len())
            .field("embedding_dim", &self.embedder.dimension())
            .finish()
    }
}

impl AppState {
    /// Assemble the state, failing if the catalog and the embedder disagree
    /// on the embedding dimension.
    pub fn new(config: Config, catalog: Catalog, embedder: Arc<dyn Embedder>) -> Result<Arc<Self>> {
        catalog.ensure_dimension(embedder.dimension())?;
        let http = build_client(config.fetch_timeout)?;

        Ok(Arc::new(Self {
            config,
            catalog: Arc::new(catalog),
            embedder,
            http,
        }))
    }
}
