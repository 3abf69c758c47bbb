use serde::{Deserialize, Serialize};
use std::fmt;

/// Title used when the upstream record carries no usable alt text.
pub const DEFAULT_TITLE: &str = "Wallpaper";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Pexels,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Pexels => write!(f, "pexels"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSources {
    pub original: String,
    pub medium: String,
    pub small: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: u64,
    pub src: PhotoSources,
    pub provider: Provider,
    pub title: String,
    pub blur_hash: Option<String>,
}

impl Photo {
    /// Identity used for list keying and de-duplication.
    pub fn key(&self) -> (Provider, u64) {
        (self.provider, self.id)
    }
}

/// One page of results as reported by the upstream API.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub photos: Vec<Photo>,
    pub total_results: u64,
}
