use anyhow::{bail, Result};
use chrono::Utc;
use log::info;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::photo::Photo;

/// One line of the `downloads.conf` ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub filename: String,
    pub title: String,
    pub url: String,
    pub saved_at: i64,
}

/// Fetches the full-resolution image and writes it into the downloads
/// directory. Files that are already present are not fetched again.
pub fn download_photo(photo: &Photo, config: &Config) -> Result<PathBuf> {
    let filename = photo_filename(photo);
    let filepath = config.downloads_dir.join(&filename);

    if !filepath.exists() {
        let response = attohttpc::get(&photo.src.original).send()?;
        if !response.is_success() {
            bail!(
                "download of {} failed with HTTP {}",
                photo.src.original,
                response.status()
            );
        }
        let bytes = response.bytes()?;
        fs::write(&filepath, bytes)?;
        info!("saved {} to {}", photo.title, filepath.display());
    }

    save_download_record(config, photo, &filename)?;
    Ok(filepath)
}

/// `<provider>-<id>.<ext>`, extension taken from the source URL.
pub fn photo_filename(photo: &Photo) -> String {
    let ext = photo
        .src
        .original
        .rsplit('.')
        .next()
        .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("jpg");
    format!("{}-{}.{}", photo.provider, photo.id, ext)
}

pub fn sanitize_filename(filename: &str) -> String {
    let sanitized = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string();

    if sanitized.len() > 100 {
        sanitized.chars().take(100).collect()
    } else {
        sanitized
    }
}

fn save_download_record(config: &Config, photo: &Photo, filename: &str) -> Result<()> {
    let ledger = fs::read_to_string(&config.downloads_file).unwrap_or_default();
    let mut lines: Vec<String> = ledger.lines().map(|s| s.to_string()).collect();

    let entry = format!(
        "{}|{}|{}|{}",
        filename,
        sanitize_filename(&photo.title),
        photo.src.original,
        Utc::now().timestamp()
    );

    // Re-downloading replaces the old entry instead of duplicating it.
    let mut found = false;
    for line in &mut lines {
        if line.starts_with(&format!("{}|", filename)) {
            *line = entry.clone();
            found = true;
            break;
        }
    }
    if !found {
        lines.push(entry);
    }

    fs::write(&config.downloads_file, lines.join("\n") + "\n")?;
    Ok(())
}

pub fn list_downloads(config: &Config) -> Result<Vec<DownloadRecord>> {
    let ledger = fs::read_to_string(&config.downloads_file).unwrap_or_default();
    let mut records = Vec::new();

    for line in ledger.lines() {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() >= 4 {
            if let Ok(saved_at) = parts[3].parse::<i64>() {
                records.push(DownloadRecord {
                    filename: parts[0].to_string(),
                    title: parts[1].to_string(),
                    url: parts[2].to_string(),
                    saved_at,
                });
            }
        }
    }

    Ok(records)
}
