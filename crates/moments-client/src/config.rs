use std::env;
use std::time::Duration;

use moments_images::ImageConfig;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// A hung record creation is abandoned after this long.
pub const CREATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub images: ImageConfig,
    pub creation_timeout: Duration,
}

impl ClientConfig {
    /// Reads `MOMENTS_SERVER_URL` plus the image provider keys.
    pub fn from_env() -> Self {
        let server_url = env::var("MOMENTS_SERVER_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            images: ImageConfig::from_env(),
            creation_timeout: CREATION_TIMEOUT,
        }
    }
}
