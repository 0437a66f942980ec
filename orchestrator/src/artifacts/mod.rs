//! Idempotent generation of target configuration files
//!
//! An artifact that already exists is never overwritten, so operator edits
//! survive every later run.

pub mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::LaunchError;
use crate::filesys::file::File;
use crate::logs::RunLog;
use crate::utils::sha256_hash;

pub use templates::{render, TemplateId, TemplateParams};

/// Result of one [`ArtifactGenerator::ensure`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub path: PathBuf,
    pub template: TemplateId,

    /// True only when this call wrote the file
    pub rendered_once: bool,

    /// SHA-256 of the written content; `None` when the file was left alone
    pub digest: Option<String>,
}

/// Renders templates into files that do not exist yet
#[derive(Clone)]
pub struct ArtifactGenerator {
    log: Arc<RunLog>,
}

impl ArtifactGenerator {
    pub fn new(log: Arc<RunLog>) -> Self {
        Self { log }
    }

    /// Write `template` to `file` unless the file already exists
    pub async fn ensure(
        &self,
        file: &File,
        template: TemplateId,
        params: &TemplateParams,
    ) -> Result<GeneratedArtifact, LaunchError> {
        if file.exists().await {
            self.log.info(format!(
                "Keeping existing {} at {}",
                template,
                file.path().display()
            ));
            return Ok(GeneratedArtifact {
                path: file.path().to_path_buf(),
                template,
                rendered_once: false,
                digest: None,
            });
        }

        let contents = render(template, params)?;
        file.write_atomic(contents.as_bytes()).await?;
        let digest = sha256_hash(contents.as_bytes());
        self.log.info(format!(
            "Generated {} at {} (sha256 {})",
            template,
            file.path().display(),
            &digest[..12]
        ));

        Ok(GeneratedArtifact {
            path: file.path().to_path_buf(),
            template,
            rendered_once: true,
            digest: Some(digest),
        })
    }

    /// Delete a generated file; a missing file is not an error
    pub async fn remove(&self, file: &File) -> Result<bool, LaunchError> {
        let removed = file.delete().await?;
        if removed {
            self.log.info(format!("Removed {}", file.path().display()));
        }
        Ok(removed)
    }
}
