use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a catalog product.
///
/// Catalog files use either integer or string ids; the original JSON type is
/// kept so responses echo ids back unchanged.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ProductId {
    /// A numeric id.
    Number(u64),
    /// A textual id.
    Text(String),
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ProductId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One catalog entry with its precomputed embedding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Product category.
    pub category: String,
    /// Path of the product image, absolute or relative to the image directory.
    pub image_path: String,
    /// Feature vector produced by the embedder.
    pub embedding: Vec<f32>,
}

/// A product returned by a search, without its embedding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResult {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Product category.
    pub category: String,
    /// Public URL path of the product image.
    pub image_path: String,
    /// Cosine similarity to the query image.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_keeps_json_type() {
        let products: Vec<Product> = serde_json::from_str(
            r#"[
                {"id": 7, "name": "Mug", "category": "kitchen", "image_path": "kitchen/mug.jpg", "embedding": [0.5, 0.5]},
                {"id": "sku-9", "name": "Lamp", "category": "home", "image_path": "home/lamp.jpg", "embedding": [1.0, 0.0]}
            ]"#,
        )
        .unwrap();

        assert_eq!(products[0].id, ProductId::Number(7));
        assert_eq!(products[1].id, ProductId::from("sku-9"));

        let out = serde_json::to_value(&products[0].id).unwrap();
        assert_eq!(out, serde_json::json!(7));
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult {
            id: ProductId::Number(1),
            name: "Chair".to_string(),
            category: "furniture".to_string(),
            image_path: "/dataset/furniture/chair.png".to_string(),
            score: 0.5,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["image_path"], "/dataset/furniture/chair.png");
        assert_eq!(value["score"], 0.5);
        assert!(value.get("embedding").is_none());
    }
}
