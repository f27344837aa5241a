use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::product::SearchResult};

/// Body of a `/search` reply: either the ranked products or an error message
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchResponse {
    /// Matches, best first
    Results {
        /// Ranked products
        results: Vec<SearchResult>,
    },
    /// Why the search could not run
    Error {
        /// Human readable message
        error: String,
    },
}

impl SearchResponse {
    /// Successful search
    pub fn results(results: Vec<SearchResult>) -> Self {
        Self::Results { results }
    }

    /// Failed search
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

impl From<AppError> for SearchResponse {
    fn from(err: AppError) -> Self {
        if err.is_client_error() {
            log::info!("Search rejected: {}", err);
        } else {
            log::error!("Search failed: {}", err);
        }
        Self::error(err.to_string())
    }
}

// Per-request failures travel in the body, so the status is always 200.
impl IntoResponse for SearchResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Service metadata returned by `/api/info`
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Build timestamp
    pub built_at: String,
    /// Products in the catalog
    pub catalog_size: usize,
    /// Length of embedding vectors
    pub embedding_dim: usize,
}
