use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::debug;

use crate::catalog::RELEVANCE_KEYWORDS;
use crate::error::ImageError;

const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";
const PIXABAY_SEARCH_URL: &str = "https://pixabay.com/api/";
const PAGE_SIZE: u32 = 30;

/// One step of the image chain. Yields the URL of an image to download.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn locate(&self, query: &str) -> Result<String, ImageError>;
}

/// A search hit with the free text used for relevance filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub description: String,
}

/// Pick uniformly among candidates whose description mentions a keyword, or
/// among all candidates when none do.
pub fn pick_candidate<'a, R: Rng + ?Sized>(
    candidates: &'a [Candidate],
    keywords: &[&str],
    rng: &mut R,
) -> Option<&'a Candidate> {
    let relevant: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            let text = c.description.to_lowercase();
            keywords.iter().any(|k| text.contains(k))
        })
        .collect();

    debug!("{} of {} candidates are relevant", relevant.len(), candidates.len());

    if relevant.is_empty() {
        candidates.choose(rng)
    } else {
        relevant.choose(rng).copied()
    }
}

fn choose_from(name: &'static str, candidates: &[Candidate]) -> Result<String, ImageError> {
    if candidates.is_empty() {
        return Err(ImageError::unavailable(name, "no results"));
    }
    pick_candidate(candidates, RELEVANCE_KEYWORDS, &mut rand::rng())
        .map(|c| c.url.clone())
        .ok_or_else(|| ImageError::unavailable(name, "no results"))
}

// -- Pexels --

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
    #[serde(default)]
    alt: Option<String>,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large: String,
}

pub fn parse_pexels(body: &str) -> Result<Vec<Candidate>, serde_json::Error> {
    let response: PexelsResponse = serde_json::from_str(body)?;
    Ok(response
        .photos
        .into_iter()
        .map(|p| Candidate {
            url: p.src.large,
            description: p.alt.unwrap_or_default(),
        })
        .collect())
}

pub struct PexelsProvider {
    client: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl PexelsProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            search_url: PEXELS_SEARCH_URL.to_string(),
        }
    }
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    fn name(&self) -> &'static str {
        "pexels"
    }

    async fn locate(&self, query: &str) -> Result<String, ImageError> {
        let per_page = PAGE_SIZE.to_string();
        let body = self
            .client
            .get(&self.search_url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", "square"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImageError::unavailable(self.name(), e))?
            .text()
            .await
            .map_err(|e| ImageError::unavailable(self.name(), e))?;

        let candidates = parse_pexels(&body).map_err(|e| ImageError::unavailable(self.name(), e))?;
        choose_from(self.name(), &candidates)
    }
}

// -- Pixabay --

#[derive(Deserialize)]
struct PixabayResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
    #[serde(default)]
    tags: String,
}

pub fn parse_pixabay(body: &str) -> Result<Vec<Candidate>, serde_json::Error> {
    let response: PixabayResponse = serde_json::from_str(body)?;
    Ok(response
        .hits
        .into_iter()
        .map(|h| Candidate {
            url: h.large_image_url,
            description: h.tags,
        })
        .collect())
}

pub struct PixabayProvider {
    client: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl PixabayProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            search_url: PIXABAY_SEARCH_URL.to_string(),
        }
    }
}

#[async_trait]
impl ImageProvider for PixabayProvider {
    fn name(&self) -> &'static str {
        "pixabay"
    }

    async fn locate(&self, query: &str) -> Result<String, ImageError> {
        let per_page = PAGE_SIZE.to_string();
        let body = self
            .client
            .get(&self.search_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("image_type", "photo"),
                ("orientation", "horizontal"),
                ("min_width", "800"),
                ("min_height", "800"),
                ("safesearch", "true"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImageError::unavailable(self.name(), e))?
            .text()
            .await
            .map_err(|e| ImageError::unavailable(self.name(), e))?;

        let candidates = parse_pixabay(&body).map_err(|e| ImageError::unavailable(self.name(), e))?;
        choose_from(self.name(), &candidates)
    }
}

// -- Static sources --

/// Hand-maintained list of direct image URLs, sampled at random.
pub struct CuratedList {
    urls: Vec<String>,
}

impl CuratedList {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl ImageProvider for CuratedList {
    fn name(&self) -> &'static str {
        "curated"
    }

    async fn locate(&self, _query: &str) -> Result<String, ImageError> {
        self.urls
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| ImageError::unavailable(self.name(), "list is empty"))
    }
}

pub struct StaticUrl {
    url: String,
}

impl StaticUrl {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl ImageProvider for StaticUrl {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn locate(&self, _query: &str) -> Result<String, ImageError> {
        Ok(self.url.clone())
    }
}
