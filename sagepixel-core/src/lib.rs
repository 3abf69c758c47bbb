pub mod client;
pub mod config;
pub mod download;
pub mod feed;
pub mod photo;

#[cfg(test)]
mod test_http;

pub use client::{
    ClientConfig, FetchError, FetchPhotos, PexelsClient, DEFAULT_CURATED_URL, DEFAULT_PER_PAGE,
    DEFAULT_SEARCH_URL,
};
pub use config::Config;
pub use download::{download_photo, list_downloads, photo_filename, sanitize_filename, DownloadRecord};
pub use feed::{
    FeedController, FetchKind, FetchRequest, Phase, SplashReport, DEBOUNCE_INTERVAL,
};
pub use photo::{Page, Photo, PhotoSources, Provider, DEFAULT_TITLE};
