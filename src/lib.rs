#![doc(html_root_url = "https://docs.rs/visual-matcher/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # Visual Matcher
//!
//! Visual product similarity search: submit an image, get back the catalog
//! products that look most like it.
//!
//! ## Features
//!
//! - **Embeddings**: pooled features from a pretrained ResNet, L2-normalized
//! - **Ranking**: cosine similarity against a precomputed catalog matrix, top-K
//! - **Catalog**: JSON or JSON Lines product files with embeddings, built offline
//! - **Web API**: upload or link an image, get ranked products as JSON
//!
//! ## Quick Start
//!
//! Build a catalog once, then serve it:
//! ```text
//! visual-matcher index ./dataset --output products.json --weights resnet18.ot
//! visual-matcher serve --catalog products.json --image-dir ./dataset
//! ```
//!
//! Ranking works without a model too:
//! ```rust
//! use ndarray::{arr1, arr2};
//! use visual_matcher::Ranker;
//!
//! let ranker = Ranker::new(arr2(&[[1.0, 0.0], [0.0, 1.0], [0.7071, 0.7071]]));
//! let hits = ranker.rank(arr1(&[1.0, 0.0]).view(), 2).unwrap();
//! assert_eq!(hits[0].index, 0);
//! assert_eq!(hits[1].index, 2);
//! ```

// Internal modules
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;
mod utils;

/// Build-time information generated by `built`.
#[allow(missing_docs, dead_code, unreachable_pub)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        catalog::{Catalog, CatalogHit},
        embeddings::{Architecture, Embedder},
        indexer::{build_catalog, IndexReport},
        similarity::{cosine_similarity, l2_normalize, top_k, Ranker, ScoredIndex},
    },
    error::{AppError, Result, ResultExt},
    models::product::{Product, ProductId, SearchResult},
    state::{AppState, Config},
};

#[cfg(feature = "web")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "embeddings")]
pub use crate::core::embeddings::ResNetEmbedder;

/// Initialize logging
///
/// `RUST_LOG` overrides the default `info` filter. It should be called early
/// in the application startup process.
///
/// # Errors
///
/// Returns an error if a logger is already installed.
///
/// # Example
///
/// ```no_run
/// use visual_matcher::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger: {}", e)))?;

    log::info!(
        "Initializing {} v{} (built {})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::BUILT_TIME_UTC
    );
    Ok(())
}

/// Embed the image stored at `path`
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded, or if the
/// embedder fails.
pub fn embed_image_file<P: AsRef<std::path::Path>>(
    embedder: &dyn Embedder,
    path: P,
) -> Result<ndarray::Array1<f32>> {
    let path = path.as_ref();
    log::debug!("Embedding image: {}", path.display());

    let data = std::fs::read(path)?;
    let image = crate::core::input::decode_image(&data)?;
    embedder.embed(&image)
}
