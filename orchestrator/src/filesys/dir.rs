//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::LaunchError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Delete the directory and all contents; returns whether it existed
    pub async fn delete(&self) -> Result<bool, LaunchError> {
        if !self.exists().await {
            return Ok(false);
        }
        fs::remove_dir_all(&self.path).await?;
        Ok(true)
    }

    /// Remove the directory only when nothing is left in it
    pub async fn remove_if_empty(&self) -> Result<bool, LaunchError> {
        if !self.exists().await {
            return Ok(false);
        }
        let mut entries = fs::read_dir(&self.path).await?;
        if entries.next_entry().await?.is_some() {
            return Ok(false);
        }
        fs::remove_dir(&self.path).await?;
        Ok(true)
    }

    /// Regular files directly inside the directory, sorted by path
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, LaunchError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }
}
