
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ImageError;

/// Refuse downloads larger than this; the source images are a few MB at most.
const MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Downloads raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, ImageError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, ImageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImageError::unavailable("download", e))?;

        if let Some(len) = response.content_length() {
            if len as usize > MAX_DOWNLOAD_BYTES {
                return Err(ImageError::unavailable("download", format!("{url} is {len} bytes")));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::unavailable("download", e))?;
        if bytes.len() > MAX_DOWNLOAD_BYTES {
            return Err(ImageError::unavailable(
                "download",
                format!("{url} is {} bytes", bytes.len()),
            ));
        }
        Ok(bytes)
    }
}
