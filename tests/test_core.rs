use assert_fs::prelude::*;
use ndarray::arr1;
use predicates::prelude::*;

use visual_matcher::core::catalog::save_products;
use visual_matcher::{AppError, Catalog, Product, ProductId};

const THREE_PRODUCTS: &str = r#"[
    {"id": 0, "name": "Red mug", "category": "kitchen", "image_path": "kitchen/red_mug.jpg", "embedding": [1.0, 0.0]},
    {"id": 1, "name": "Blue lamp", "category": "home", "image_path": "home/blue_lamp.jpg", "embedding": [0.0, 1.0]},
    {"id": 2, "name": "Purple vase", "category": "home", "image_path": "home/purple_vase.jpg", "embedding": [0.70710677, 0.70710677]}
]"#;

#[test]
fn test_known_embeddings_scenario() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("products.json");
    file.write_str(THREE_PRODUCTS).unwrap();

    let catalog = Catalog::load(file.path()).unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.dimension(), Some(2));

    let hits = catalog.search(arr1(&[1.0, 0.0]).view(), 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].product.id, ProductId::Number(0));
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(hits[1].product.id, ProductId::Number(2));
    assert!((hits[1].score - 0.70710677).abs() < 1e-4);
}

#[test]
fn test_results_sorted_and_bounded() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("products.json");
    file.write_str(THREE_PRODUCTS).unwrap();
    let catalog = Catalog::load(file.path()).unwrap();

    let query = arr1(&[0.2, 0.9]);
    for k in [0usize, 1, 3, 50] {
        let hits = catalog.search(query.view(), k).unwrap();
        assert_eq!(hits.len(), k.min(catalog.len()));
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[test]
fn test_missing_catalog_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let missing = temp.child("nope.json");
    missing.assert(predicate::path::missing());

    let err = Catalog::load(missing.path()).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_malformed_catalog_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("products.json");
    file.write_str(r#"[{"id": 1, "name": "no embedding"}]"#).unwrap();

    let err = Catalog::load(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Json(_)));
}

#[test]
fn test_empty_catalog_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("products.json");
    file.write_str("[]").unwrap();

    let catalog = Catalog::load(file.path()).unwrap();
    assert!(catalog.is_empty());
    assert!(catalog.search(arr1(&[1.0]).view(), 10).unwrap().is_empty());
}

#[test]
fn test_saved_catalog_loads_back() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("catalogs/products.json");

    let products = vec![Product {
        id: ProductId::from("sku-1"),
        name: "Tote".to_string(),
        category: "bags".to_string(),
        image_path: "bags/tote.png".to_string(),
        embedding: vec![0.6, 0.8],
    }];
    save_products(out.path(), &products).unwrap();

    out.assert(predicate::str::contains("\"sku-1\""));
    let catalog = Catalog::load(out.path()).unwrap();
    assert_eq!(catalog.products(), products.as_slice());
}
