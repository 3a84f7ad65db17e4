//! Domain models for upstream datasets and locally derived artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SERVICE_URI;

/// Namespace for logical file identifiers minted by the sync engine.
pub const FILE_NAMESPACE: &str = "http://themis.vlaanderen.be/id/file/";

/// A versioned publication unit listed by the upstream catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Upstream identifier.
    pub id: String,
    /// Canonical URI of the dataset.
    pub uri: String,
    /// Release timestamp; drives ordering and the watermark.
    pub release_date: DateTime<Utc>,
    /// Link to the paginated distribution listing.
    pub distributions_link: String,
    /// Link to the superseded dataset, if this is a new version.
    pub previous_version_link: Option<String>,
    /// Filled by the pipeline right before consumption.
    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// One downloadable representation of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub type_uri: Option<String>,
    pub download_url: String,
    /// Entity the distribution belongs to (attachments only).
    pub subject: Option<String>,
}

/// What role a distribution plays during consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    PrimaryContent,
    Attachment,
    Other,
}

// =============================================================================
// Pagination
// =============================================================================

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

/// A single page of an upstream listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: usize,
}

// =============================================================================
// Derived artifacts
// =============================================================================

/// Durable local copy of a dataset's primary content plus its metadata.
///
/// Registered in the target store so a later version of the same dataset
/// can find and retract exactly these statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub logical_uri: String,
    pub logical_id: Uuid,
    pub physical_uri: String,
    pub physical_id: Uuid,
    pub file_name: String,
    pub extension: String,
    pub format: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    /// Dataset the statements were derived from.
    pub dataset_uri: String,
    pub creator: String,
}

impl FileRecord {
    /// Builds the record for a Turtle file written to the share.
    pub fn turtle(
        dataset_uri: &str,
        physical_uri: &str,
        file_name: &str,
        size: u64,
        created: DateTime<Utc>,
    ) -> Self {
        let logical_id = Uuid::new_v4();
        Self {
            logical_uri: format!("{}{}", FILE_NAMESPACE, logical_id),
            logical_id,
            physical_uri: physical_uri.to_string(),
            physical_id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            extension: ".ttl".to_string(),
            format: "text/turtle".to_string(),
            size,
            created,
            dataset_uri: dataset_uri.to_string(),
            creator: SERVICE_URI.to_string(),
        }
    }
}
