//! Offline catalog building from a directory of product images

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::embeddings::Embedder;
use crate::error::{AppError, Result};
use crate::models::product::{Product, ProductId};
use crate::utils::{display_name, normalize_path, validate_file_extension, IMAGE_EXTENSIONS};

/// Category assigned to images directly under the root
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Summary of an indexing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Images embedded into the catalog
    pub indexed: usize,
    /// Image files that could not be decoded or embedded
    pub skipped: Vec<PathBuf>,
}

/// Image files under `root`, in a stable (sorted) order.
pub fn discover_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AppError::NotFound(format!("image directory {}", root.display())));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if validate_file_extension(&name, IMAGE_EXTENSIONS) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Catalog metadata derived from an image's location under `root`.
///
/// Returns `(name, category, relative_path)`.
fn describe(root: &Path, path: &Path) -> (String, String, String) {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let category = relative
        .parent()
        .and_then(|p| p.components().next())
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let name = relative
        .file_stem()
        .map(|s| display_name(&s.to_string_lossy()))
        .unwrap_or_default();
    (name, category, normalize_path(&relative.to_string_lossy()))
}

/// Embed every image under `root`, returning the products in discovery order.
///
/// Files that fail to decode are skipped and listed in the report.
pub fn build_catalog(embedder: &dyn Embedder, root: &Path) -> Result<(Vec<Product>, IndexReport)> {
    let files = discover_images(root)?;
    log::info!("Indexing {} images under {}", files.len(), root.display());

    let mut products = Vec::with_capacity(files.len());
    let mut report = IndexReport::default();

    for path in files {
        let embedding = match image::open(&path)
            .map_err(AppError::from)
            .and_then(|img| embedder.embed(&img))
        {
            Ok(embedding) => embedding,
            Err(e) if e.is_client_error() => {
                log::warn!("Skipping {}: {}", path.display(), e);
                report.skipped.push(path);
                continue;
            }
            Err(e) => return Err(e),
        };

        let (name, category, image_path) = describe(root, &path);
        products.push(Product {
            id: ProductId::Number(products.len() as u64),
            name,
            category,
            image_path,
            embedding: embedding.to_vec(),
        });

        if products.len() % 100 == 0 {
            log::info!("Indexed {} images", products.len());
        }
    }

    report.indexed = products.len();
    Ok((products, report))
}
