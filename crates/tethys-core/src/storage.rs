//! Shared file storage addressed through `share://` URIs.
//!
//! The target store refers to local files by physical URIs of the form
//! `share://<relative path>`. [`FileShare`] maps those URIs onto a root
//! directory on disk and performs the file I/O the pipeline needs.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::AppError;

pub const SHARE_SCHEME: &str = "share://";

/// Size and creation time of a file written to the share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub created: DateTime<Utc>,
}

/// Root directory backing `share://` URIs.
#[derive(Debug, Clone)]
pub struct FileShare {
    root: PathBuf,
}

impl FileShare {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical URI for a file name relative to the share root.
    pub fn uri_for(&self, file_name: &str) -> String {
        format!("{}{}", SHARE_SCHEME, file_name)
    }

    /// Resolves a physical URI to a path under the share root.
    ///
    /// Rejects URIs with another scheme and paths escaping the root.
    pub fn path_for(&self, physical_uri: &str) -> Result<PathBuf, AppError> {
        let Some(relative) = physical_uri.strip_prefix(SHARE_SCHEME) else {
            return Err(AppError::InvalidUrl(format!(
                "Not a share URI: {}",
                physical_uri
            )));
        };
        let relative = Path::new(relative);
        let confined = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !confined {
            return Err(AppError::InvalidUrl(format!(
                "Share URI escapes the share root: {}",
                physical_uri
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Resolves a physical URI and creates its parent directories.
    pub async fn prepare(&self, physical_uri: &str) -> Result<PathBuf, AppError> {
        let path = self.path_for(physical_uri)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }

    /// Writes `contents` to the file behind `physical_uri`, replacing it.
    pub async fn write(&self, physical_uri: &str, contents: &[u8]) -> Result<FileStat, AppError> {
        let path = self.prepare(physical_uri).await?;
        fs::write(&path, contents).await?;
        let metadata = fs::metadata(&path).await?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(FileStat {
            size: metadata.len(),
            created,
        })
    }

    pub async fn read_to_string(&self, physical_uri: &str) -> Result<String, AppError> {
        let path = self.path_for(physical_uri)?;
        Ok(fs::read_to_string(path).await?)
    }
}
