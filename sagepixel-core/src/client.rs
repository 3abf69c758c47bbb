use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::photo::{Page, Photo, PhotoSources, Provider, DEFAULT_TITLE};

pub const DEFAULT_SEARCH_URL: &str = "https://api.pexels.com/v1/search";
pub const DEFAULT_CURATED_URL: &str = "https://api.pexels.com/v1/curated";
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Everything the client needs is injected here; nothing is compiled in.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub search_url: String,
    pub curated_url: String,
    pub per_page: u32,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            curated_url: DEFAULT_CURATED_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Reads the API credential from `PEXELS_API_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("PEXELS_API_KEY")
            .map_err(|_| anyhow::anyhow!("PEXELS_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] attohttpc::Error),

    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Seam between feed hosts and the concrete HTTP client.
pub trait FetchPhotos {
    fn fetch_page(&self, query: &str, page: u32) -> Result<Page, FetchError>;
}

// Wire format of the Pexels photo endpoints. `photos` is mandatory so a
// schema-drifted body surfaces as a deserialization error.
#[derive(Debug, Deserialize)]
struct PexelsResponse {
    photos: Vec<PexelsPhoto>,
    #[serde(default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    src: PexelsSrc,
    alt: Option<String>,
    #[serde(default)]
    blur_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    original: String,
    medium: String,
    small: String,
}

impl From<PexelsPhoto> for Photo {
    fn from(raw: PexelsPhoto) -> Self {
        let title = match raw.alt {
            Some(alt) if !alt.trim().is_empty() => alt,
            _ => DEFAULT_TITLE.to_string(),
        };
        Photo {
            id: raw.id,
            src: PhotoSources {
                original: raw.src.original,
                medium: raw.src.medium,
                small: raw.src.small,
            },
            provider: Provider::Pexels,
            title,
            blur_hash: raw.blur_hash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PexelsClient {
    config: ClientConfig,
}

impl PexelsClient {
    pub fn new(config: ClientConfig) -> Self {
        PexelsClient { config }
    }

    /// One GET against the search endpoint (non-empty query) or the curated
    /// endpoint (empty query). A body that no longer matches the expected
    /// schema degrades to an empty page instead of failing the feed.
    pub fn fetch_page(&self, query: &str, page: u32) -> Result<Page, FetchError> {
        let request = if query.is_empty() {
            attohttpc::get(&self.config.curated_url)
        } else {
            attohttpc::get(&self.config.search_url).param("query", query)
        };

        let response = request
            .param("per_page", self.config.per_page)
            .param("page", page)
            .header("Authorization", self.config.api_key.as_str())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            warn!("pexels request for page {} failed with HTTP {}", page, status);
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        match parse_page(&body) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                warn!("unexpected pexels response shape, treating as empty page: {}", err);
                Ok(Page::default())
            }
        }
    }
}

impl FetchPhotos for PexelsClient {
    fn fetch_page(&self, query: &str, page: u32) -> Result<Page, FetchError> {
        PexelsClient::fetch_page(self, query, page)
    }
}

fn parse_page(body: &str) -> Result<Page, FetchError> {
    let raw: PexelsResponse = serde_json::from_str(body)?;
    Ok(Page {
        photos: raw.photos.into_iter().map(Photo::from).collect(),
        total_results: raw.total_results,
    })
}
