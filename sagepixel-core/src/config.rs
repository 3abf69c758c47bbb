use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-user directories for saved wallpapers and their metadata ledger.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub downloads_file: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "sagepixel", "sagepixel")
            .context("Failed to get project directories")?;
        Self::at(proj_dirs.config_dir())
    }

    /// Same layout rooted at an arbitrary directory; used by tests.
    pub fn at(root: &Path) -> Result<Self> {
        let config_dir = root.to_path_buf();
        let downloads_dir = config_dir.join("downloads");
        let downloads_file = config_dir.join("downloads.conf");

        fs::create_dir_all(&config_dir)?;
        fs::create_dir_all(&downloads_dir)?;

        if !downloads_file.exists() {
            fs::write(&downloads_file, "")?;
        }

        Ok(Config {
            config_dir,
            downloads_dir,
            downloads_file,
        })
    }
}
