//! Core functionality: embedding, ranking and catalog management

/// Holds the immutable product catalog and answers similarity queries.
pub mod catalog;
/// Extracts normalized feature vectors from images.
pub mod embeddings;
/// Builds catalog files from directories of product images.
pub mod indexer;
pub mod input;
/// Cosine similarity and top-K selection.
pub mod similarity;
