//! Turning request payloads into decoded images

use std::time::Duration;

use bytes::Bytes;
use image::DynamicImage;

use crate::error::{AppError, Result};

/// Where a query image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw bytes of an uploaded file
    Upload(Bytes),
    /// Remote image to download
    Url(String),
}

/// Build the HTTP client used for image-by-URL queries.
///
/// `timeout` bounds the whole request so one slow host cannot hold a worker.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))
}

/// Decode an in-memory image and convert it to RGB.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(AppError::InvalidInput("image payload is empty".to_string()));
    }
    let img = image::load_from_memory(data)?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Download the bytes behind `url`, refusing bodies larger than `max_bytes`.
pub async fn fetch_image_bytes(client: &reqwest::Client, url: &str, max_bytes: u64) -> Result<Bytes> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| AppError::Fetch(format!("invalid URL '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Fetch(format!(
            "unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }

    log::debug!("Fetching query image from {}", parsed);
    let response = client.get(parsed).send().await?.error_for_status()?;

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(AppError::Fetch(format!(
                "remote image is {} bytes, limit is {}",
                len, max_bytes
            )));
        }
    }

    let body = response.bytes().await?;
    if body.len() as u64 > max_bytes {
        return Err(AppError::Fetch(format!(
            "remote image is {} bytes, limit is {}",
            body.len(),
            max_bytes
        )));
    }
    Ok(body)
}

impl ImageSource {
    /// Resolve the source into a decoded RGB image.
    pub async fn load(self, client: &reqwest::Client, max_bytes: u64) -> Result<DynamicImage> {
        match self {
            Self::Upload(data) => decode_image(&data),
            Self::Url(url) => {
                let data = fetch_image_bytes(client, &url, max_bytes).await?;
                decode_image(&data).map_err(|e| match e {
                    AppError::Image(err) => AppError::Fetch(format!("not a decodable image: {}", err)),
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = decode_image(&png_bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AppError::Image(_)));
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(decode_image(&[]), Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_scheme() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let err = fetch_image_bytes(&client, "ftp://example.com/a.png", 1024).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_chunked_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // No Content-Length, so only the size of the received body can be checked
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();

            let chunk = vec![b'x'; 2048];
            let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
            response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            response.extend_from_slice(&chunk);
            response.extend_from_slice(b"\r\n0\r\n\r\n");
            socket.write_all(&response).await.unwrap();
        });

        let client = build_client(Duration::from_secs(2)).unwrap();
        let url = format!("http://{}/stream.png", addr);
        let err = fetch_image_bytes(&client, &url, 1024).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to load image from URL: remote image is 2048 bytes, limit is 1024"
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_url() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let err = fetch_image_bytes(&client, "not a url", 1024).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to load image from URL"));
    }
}
