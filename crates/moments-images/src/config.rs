use std::env;
use std::time::Duration;

use tracing::info;

use crate::catalog::{CURATED_IMAGES, LAST_RESORT_IMAGE};

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub pexels_api_key: Option<String>,
    pub pixabay_api_key: Option<String>,
    pub curated_images: Vec<String>,
    pub last_resort_image: String,
    /// Neither side of a normalized image exceeds this.
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub http_timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            pexels_api_key: None,
            pixabay_api_key: None,
            curated_images: CURATED_IMAGES.iter().map(|s| s.to_string()).collect(),
            last_resort_image: LAST_RESORT_IMAGE.to_string(),
            max_dimension: 768,
            jpeg_quality: 80,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ImageConfig {
    /// Reads `PEXELS_API_KEY`, `PIXABAY_API_KEY` and `MOMENTS_CURATED_IMAGES`
    /// (comma-separated URLs added to the built-in curated list).
    pub fn from_env() -> Self {
        let mut config = Self {
            pexels_api_key: non_empty_var("PEXELS_API_KEY"),
            pixabay_api_key: non_empty_var("PIXABAY_API_KEY"),
            ..Self::default()
        };

        if let Some(extra) = non_empty_var("MOMENTS_CURATED_IMAGES") {
            let before = config.curated_images.len();
            config.curated_images.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(String::from),
            );
            info!("Added {} curated images", config.curated_images.len() - before);
        }

        config
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
