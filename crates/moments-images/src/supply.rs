use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{info, warn};

use crate::catalog::SEARCH_TERMS;
use crate::config::ImageConfig;
use crate::error::ImageError;
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::normalize::normalize;
use crate::providers::{
    CuratedList, ImageProvider, PexelsProvider, PixabayProvider, StaticUrl,
};

/// Today's image, ready to be stored on a record.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// `data:<mime>;base64,...`
    pub data_url: String,
    pub provider: &'static str,
    pub source_url: String,
}

/// Anything that can produce today's image.
#[async_trait]
pub trait DailyImageSource: Send + Sync {
    async fn resolve(&self) -> Result<ResolvedImage, ImageError>;
}

pub struct ImageSupply {
    providers: Vec<Box<dyn ImageProvider>>,
    fetcher: Box<dyn ImageFetcher>,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImageSupply {
    pub fn new(
        providers: Vec<Box<dyn ImageProvider>>,
        fetcher: Box<dyn ImageFetcher>,
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            providers,
            fetcher,
            max_dimension,
            jpeg_quality,
        }
    }

    /// Build the full chain. Search providers without an API key are left out.
    pub fn from_config(config: &ImageConfig) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ImageError::unavailable("http client", e))?;

        let mut providers: Vec<Box<dyn ImageProvider>> = Vec::new();
        match &config.pexels_api_key {
            Some(key) => providers.push(Box::new(PexelsProvider::new(client.clone(), key.clone()))),
            None => info!("PEXELS_API_KEY not set, skipping Pexels"),
        }
        match &config.pixabay_api_key {
            Some(key) => providers.push(Box::new(PixabayProvider::new(client.clone(), key.clone()))),
            None => info!("PIXABAY_API_KEY not set, skipping Pixabay"),
        }
        providers.push(Box::new(CuratedList::new(config.curated_images.clone())));
        providers.push(Box::new(StaticUrl::new(config.last_resort_image.clone())));

        Ok(Self::new(
            providers,
            Box::new(HttpFetcher::with_client(client)),
            config.max_dimension,
            config.jpeg_quality,
        ))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    async fn try_provider(
        &self,
        provider: &dyn ImageProvider,
        query: &str,
    ) -> Result<ResolvedImage, ImageError> {
        let name = provider.name();
        let source_url = provider.locate(query).await?;
        let bytes = self.fetcher.fetch(&source_url).await?;

        let (max, quality) = (self.max_dimension, self.jpeg_quality);
        let normalized = tokio::task::spawn_blocking(move || normalize(&bytes, max, quality))
            .await
            .map_err(|e| ImageError::unavailable(name, e))?
            .map_err(|e| ImageError::unavailable(name, e))?;

        Ok(ResolvedImage {
            data_url: normalized.data_url(),
            provider: name,
            source_url,
        })
    }
}

#[async_trait]
impl DailyImageSource for ImageSupply {
    async fn resolve(&self) -> Result<ResolvedImage, ImageError> {
        let query = SEARCH_TERMS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("fantasy landscape");
        info!("Resolving daily image for \"{}\"", query);

        for provider in &self.providers {
            match self.try_provider(provider.as_ref(), query).await {
                Ok(image) => {
                    info!(
                        "Daily image from {} ({} bytes as data URL)",
                        image.provider,
                        image.data_url.len()
                    );
                    return Ok(image);
                }
                Err(e) => warn!("Image step {} failed: {}", provider.name(), e),
            }
        }

        Err(ImageError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use bytes::Bytes;
    use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Search provider that never finds anything.
    struct EmptySearch(&'static str);

    #[async_trait]
    impl ImageProvider for EmptySearch {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn locate(&self, _query: &str) -> Result<String, ImageError> {
            Err(ImageError::unavailable(self.0, "no results"))
        }
    }

    /// Serves a generated 2000x1000 PNG for every URL except `broken`.
    #[derive(Default)]
    struct FakeFetcher {
        broken: Option<String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, ImageError> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.broken.as_deref() == Some(url) {
                return Err(ImageError::unavailable("download", "404"));
            }
            let img = ImageBuffer::from_fn(2000, 1000, |x, _| Rgb([(x % 256) as u8, 90, 200]));
            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(img)
                .write_to(&mut out, ImageFormat::Png)
                .unwrap();
            Ok(Bytes::from(out.into_inner()))
        }
    }

    fn decode_data_url(data_url: &str) -> DynamicImage {
        let (_, payload) = data_url.split_once(";base64,").unwrap();
        image::load_from_memory(&B64.decode(payload).unwrap()).unwrap()
    }

    fn curated() -> Vec<String> {
        vec!["https://curated/1.jpg".to_string(), "https://curated/2.jpg".to_string()]
    }

    #[tokio::test]
    async fn empty_searches_fall_back_to_curated_list() {
        let supply = ImageSupply::new(
            vec![
                Box::new(EmptySearch("pexels")),
                Box::new(EmptySearch("pixabay")),
                Box::new(CuratedList::new(curated())),
                Box::new(StaticUrl::new("https://static/last.jpg".to_string())),
            ],
            Box::new(FakeFetcher::default()),
            768,
            80,
        );

        let image = supply.resolve().await.unwrap();
        assert_eq!(image.provider, "curated");
        assert!(curated().contains(&image.source_url));
        assert!(image.data_url.starts_with("data:image/jpeg;base64,"));

        let (w, h) = decode_data_url(&image.data_url).dimensions();
        assert!(w.max(h) <= 768);
        assert_eq!((w, h), (768, 384));
    }

    #[tokio::test]
    async fn unconfigured_searches_are_skipped() {
        let config = ImageConfig::default();
        let supply = ImageSupply::from_config(&config).unwrap();
        assert_eq!(supply.provider_names(), vec!["curated", "static"]);

        let config = ImageConfig {
            pixabay_api_key: Some("key".to_string()),
            ..ImageConfig::default()
        };
        let supply = ImageSupply::from_config(&config).unwrap();
        assert_eq!(supply.provider_names(), vec!["pixabay", "curated", "static"]);
    }

    #[tokio::test]
    async fn failed_download_advances_the_chain() {
        let fetcher = FakeFetcher {
            broken: Some("https://curated/only.jpg".to_string()),
            ..FakeFetcher::default()
        };
        let supply = ImageSupply::new(
            vec![
                Box::new(CuratedList::new(vec!["https://curated/only.jpg".to_string()])),
                Box::new(StaticUrl::new("https://static/last.jpg".to_string())),
            ],
            Box::new(fetcher),
            768,
            80,
        );

        let image = supply.resolve().await.unwrap();
        assert_eq!(image.provider, "static");
        assert_eq!(image.source_url, "https://static/last.jpg");
    }

    #[tokio::test]
    async fn exhausted_chain_is_an_error() {
        let supply = ImageSupply::new(
            vec![Box::new(EmptySearch("pexels")), Box::new(CuratedList::new(Vec::new()))],
            Box::new(FakeFetcher::default()),
            768,
            80,
        );
        assert!(matches!(supply.resolve().await, Err(ImageError::Exhausted)));
    }
}
