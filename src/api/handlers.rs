use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Html,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    core::input::ImageSource,
    error::{AppError, Result},
    models::product::SearchResult,
    AppState,
};

use super::responses::{InfoResponse, SearchResponse};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

const MISSING_INPUT: &str = "Please upload an image or provide an image URL.";

/// Fields of the `/search` form
#[derive(Debug, Default)]
pub(crate) struct SearchForm {
    pub(crate) file: Option<Bytes>,
    pub(crate) image_url: Option<String>,
    pub(crate) top_k: Option<String>,
}

impl SearchForm {
    async fn from_multipart(mut multipart: Multipart, max_file_bytes: u64) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let content = field.bytes().await?;
                    if content.len() as u64 > max_file_bytes {
                        return Err(AppError::UploadError(format!(
                            "file is {} bytes, limit is {}",
                            content.len(),
                            max_file_bytes
                        )));
                    }
                    // Browsers send an empty part when no file is picked
                    if !content.is_empty() {
                        form.file = Some(content);
                    }
                }
                "image_url" => {
                    let url = field.text().await?;
                    let url = url.trim();
                    if !url.is_empty() {
                        form.image_url = Some(url.to_string());
                    }
                }
                "top_k" => form.top_k = Some(field.text().await?),
                other => log::debug!("Ignoring form field '{}'", other),
            }
        }

        Ok(form)
    }

    /// The image to search with; an upload wins over a URL.
    pub(crate) fn source(&mut self) -> Result<ImageSource> {
        if let Some(data) = self.file.take() {
            Ok(ImageSource::Upload(data))
        } else if let Some(url) = self.image_url.take() {
            Ok(ImageSource::Url(url))
        } else {
            Err(AppError::InvalidInput(MISSING_INPUT.to_string()))
        }
    }

    /// Requested result count. Negative counts mean "nothing".
    pub(crate) fn top_k(&self, default: usize) -> Result<usize> {
        match self.top_k.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw
                .parse::<i64>()
                .map(|k| usize::try_from(k.max(0)).unwrap_or(usize::MAX))
                .map_err(|_| AppError::InvalidInput(format!("top_k must be an integer, got '{}'", raw))),
        }
    }
}

async fn run_search(state: &AppState, multipart: Multipart) -> Result<Vec<SearchResult>> {
    let started = Instant::now();
    let mut form = SearchForm::from_multipart(multipart, state.config.max_upload_size).await?;
    let top_k = form.top_k(state.config.default_top_k)?;
    let source = form.source()?;

    let img = source.load(&state.http, state.config.max_upload_size).await?;

    let embedder = Arc::clone(&state.embedder);
    let query = tokio::task::spawn_blocking(move || embedder.embed(&img)).await??;

    let results = state.catalog.search_results(
        &query,
        top_k,
        &state.config.image_dir,
        &state.config.image_mount,
    )?;

    log::debug!(
        "Search returned {} of {} requested results in {:?}",
        results.len(),
        top_k,
        started.elapsed()
    );
    Ok(results)
}

/// `POST /search`: rank catalog products against an uploaded or linked image
pub async fn search(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> SearchResponse {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return AppError::UploadError(rejection.body_text()).into();
        }
    };

    match run_search(&state, multipart).await {
        Ok(results) => SearchResponse::results(results),
        Err(e) => e.into(),
    }
}

/// `GET /`: the search page
pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /api/info`: build and catalog metadata
pub async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: crate::built_info::PKG_NAME.to_string(),
        version: crate::built_info::PKG_VERSION.to_string(),
        built_at: crate::built_info::BUILT_TIME_UTC.to_string(),
        catalog_size: state.catalog.len(),
        embedding_dim: state.embedder.dimension(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_parsing() {
        let mut form = SearchForm::default();
        assert_eq!(form.top_k(10).unwrap(), 10);

        form.top_k = Some(" 3 ".to_string());
        assert_eq!(form.top_k(10).unwrap(), 3);

        form.top_k = Some("-4".to_string());
        assert_eq!(form.top_k(10).unwrap(), 0);

        form.top_k = Some("".to_string());
        assert_eq!(form.top_k(7).unwrap(), 7);

        form.top_k = Some("five".to_string());
        assert!(matches!(form.top_k(10), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_source_prefers_upload() {
        let mut form = SearchForm {
            file: Some(Bytes::from_static(b"png")),
            image_url: Some("http://example.com/a.png".to_string()),
            top_k: None,
        };
        assert!(matches!(form.source().unwrap(), ImageSource::Upload(_)));
    }

    #[test]
    fn test_source_missing() {
        let err = SearchForm::default().source().unwrap_err();
        assert_eq!(err.to_string(), format!("Invalid input: {}", MISSING_INPUT));
    }
}
