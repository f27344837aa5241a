//! Data models shared by the catalog, the indexer and the HTTP API

/// Catalog products and search results.
pub mod product;
