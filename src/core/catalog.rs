use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView1};

use crate::core::similarity::{Ranker, ScoredIndex};
use crate::error::{AppError, Result};
use crate::models::product::{Product, SearchResult};
use crate::utils::public_image_path;

/// Immutable product catalog with its embedding matrix.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    ranker: Ranker,
}

/// A catalog product matched by a search
#[derive(Debug, Clone, Copy)]
pub struct CatalogHit<'a> {
    /// The matched product
    pub product: &'a Product,
    /// Cosine similarity to the query
    pub score: f32,
}

impl Catalog {
    /// Build a catalog from products, checking that every embedding has the
    /// same length.
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let dim = products.first().map(|p| p.embedding.len()).unwrap_or(0);

        let mut flat = Vec::with_capacity(products.len() * dim);
        for product in &products {
            if product.embedding.len() != dim {
                return Err(AppError::Config(format!(
                    "product {} has a {}-dimensional embedding, expected {}",
                    product.id,
                    product.embedding.len(),
                    dim
                )));
            }
            flat.extend_from_slice(&product.embedding);
        }

        let matrix = Array2::from_shape_vec((products.len(), dim), flat)
            .map_err(|e| AppError::Internal(format!("embedding matrix: {}", e)))?;

        Ok(Self {
            ranker: Ranker::new(matrix),
            products,
        })
    }

    /// Load a catalog file.
    ///
    /// Accepts a JSON array of products or a stream of product objects (one
    /// per line).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("catalog file {}", path.display()))
            } else {
                AppError::Io(e)
            }
        })?;

        let products = parse_products(&content)?;
        let catalog = Self::new(products)?;
        log::info!(
            "Loaded {} products from {} (embedding dimension {:?})",
            catalog.len(),
            path.display(),
            catalog.dimension()
        );
        Ok(catalog)
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Embedding dimension, `None` when the catalog is empty.
    pub fn dimension(&self) -> Option<usize> {
        self.ranker.dimension()
    }

    /// Products in catalog order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Fail unless the catalog lives in an embedding space of dimension `dim`.
    pub fn ensure_dimension(&self, dim: usize) -> Result<()> {
        match self.dimension() {
            Some(d) if d != dim => Err(AppError::Config(format!(
                "catalog embeddings have dimension {} but the embedder produces {}; \
                 rebuild the catalog with the same model",
                d, dim
            ))),
            _ => Ok(()),
        }
    }

    /// The `k` products most similar to `query`, best first.
    pub fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<CatalogHit<'_>>> {
        let ranked = self.ranker.rank(query, k)?;
        Ok(ranked
            .into_iter()
            .map(|ScoredIndex { index, score }| CatalogHit {
                product: &self.products[index],
                score,
            })
            .collect())
    }

    /// Search and shape the hits for the API, rewriting image paths to their
    /// public URL under `mount`.
    pub fn search_results(
        &self,
        query: &Array1<f32>,
        k: usize,
        image_dir: &Path,
        mount: &str,
    ) -> Result<Vec<SearchResult>> {
        Ok(self
            .search(query.view(), k)?
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.product.id.clone(),
                name: hit.product.name.clone(),
                category: hit.product.category.clone(),
                image_path: public_image_path(image_dir, &hit.product.image_path, mount),
                score: hit.score,
            })
            .collect())
    }
}

fn parse_products(content: &str) -> Result<Vec<Product>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    serde_json::Deserializer::from_str(trimmed)
        .into_iter::<Product>()
        .map(|item| item.map_err(AppError::from))
        .collect()
}

/// Write products as a pretty-printed JSON array.
pub fn save_products<P: AsRef<Path>>(path: P, products: &[Product]) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(products)?;
    std::fs::write(path, json)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::ProductId;
    use ndarray::arr1;

    fn product(id: u64, embedding: Vec<f32>) -> Product {
        Product {
            id: ProductId::Number(id),
            name: format!("Product {}", id),
            category: "test".to_string(),
            image_path: format!("test/{}.jpg", id),
            embedding,
        }
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let err = Catalog::new(vec![product(0, vec![1.0, 0.0]), product(1, vec![1.0])]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_empty_catalog_search() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.dimension(), None);
        assert!(catalog.ensure_dimension(512).is_ok());
        assert!(catalog.search(arr1(&[1.0, 0.0]).view(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_dimension() {
        let catalog = Catalog::new(vec![product(0, vec![1.0, 0.0])]).unwrap();
        assert!(catalog.ensure_dimension(2).is_ok());
        assert!(matches!(catalog.ensure_dimension(512), Err(AppError::Config(_))));
    }

    #[test]
    fn test_parse_json_lines() {
        let content = r#"{"id": 1, "name": "a", "category": "c", "image_path": "a.jpg", "embedding": [1.0]}
{"id": 2, "name": "b", "category": "c", "image_path": "b.jpg", "embedding": [0.5]}
"#;
        let products = parse_products(content).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].name, "b");
    }

    #[test]
    fn test_parse_blank_file() {
        assert!(parse_products("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_search_results_rewrite_paths() {
        let mut p = product(3, vec![0.0, 1.0]);
        p.image_path = "/data/images/bags/tote.jpg".to_string();
        let catalog = Catalog::new(vec![p]).unwrap();

        let results = catalog
            .search_results(&arr1(&[0.0, 2.0]), 5, Path::new("/data/images"), "/dataset")
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].image_path, "/dataset/bags/tote.jpg");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }
}
