//! Configuration types for tethys components.
//!
//! Defaults mirror the production deployment: datasets come from the Themis
//! catalog, statements land in the public graph, and every batch holds at
//! most 100 statements. The server crate overlays environment variables on
//! top of these defaults.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{Distribution, DistributionKind};

// =============================================================================
// Well-known identifiers
// =============================================================================

/// Default base URL of the upstream catalog.
pub const DEFAULT_CATALOG_URL: &str = "https://themis.vlaanderen.be";

/// Graph that receives every synced statement and file record.
pub const PUBLIC_GRAPH: &str = "http://mu.semte.ch/graphs/public";

/// Distribution type marking the primary statement content of a dataset.
pub const CONTENT_DISTRIBUTION_TYPE: &str =
    "http://themis.vlaanderen.be/id/concept/distribution-type/dd5bfc23-8f88-4df5-80f6-a9f72e08d7c4";

/// Distribution type marking a binary attachment.
pub const ATTACHMENT_DISTRIBUTION_TYPE: &str =
    "http://themis.vlaanderen.be/id/concept/distribution-type/c4d99dde-3df9-4da1-8136-9a3b2de82de4";

/// Classification value that earns an entity the local news item type.
pub const DOCUMENT_CLASSIFICATION: &str =
    "http://themis.vlaanderen.be/id/concept/document-type/63d628cb-a594-4166-8b4e-880b4214fc5b";

/// Namespace used to skolemize blank nodes of fetched content.
pub const SKOLEM_NAMESPACE: &str = "http://themis.vlaanderen.be/.well-known/genid/";

/// Creator recorded on every derived artifact.
pub const SERVICE_URI: &str = "http://themis.vlaanderen.be/id/service/valvas-publication-consumer";

/// Page size used for every paginated upstream listing.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum statements per insert or delete request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// =============================================================================
// HTTP
// =============================================================================

/// HTTP client configuration for calls to the upstream catalog.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("tethys/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Target store connection configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SPARQL endpoint accepting both queries and updates.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://database:8890/sparql".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Sync
// =============================================================================

/// Dataset synchronization configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Statements per insert request.
    pub write_batch_size: usize,
    /// Statements per delete request.
    pub delete_batch_size: usize,
    /// Page size for dataset and distribution listings.
    pub page_size: usize,
    /// Lower bound used when no task has recorded a watermark yet.
    pub start_from: Option<DateTime<Utc>>,
    /// Graph receiving synced statements.
    pub graph: String,
    pub content_distribution_type: String,
    pub attachment_distribution_type: String,
    pub document_classification: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_batch_size: DEFAULT_BATCH_SIZE,
            delete_batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            start_from: None,
            graph: PUBLIC_GRAPH.to_string(),
            content_distribution_type: CONTENT_DISTRIBUTION_TYPE.to_string(),
            attachment_distribution_type: ATTACHMENT_DISTRIBUTION_TYPE.to_string(),
            document_classification: DOCUMENT_CLASSIFICATION.to_string(),
        }
    }
}

impl SyncConfig {
    /// Sets the insert and delete batch sizes. Zero is clamped to one.
    pub fn with_batch_sizes(mut self, write: usize, delete: usize) -> Self {
        self.write_batch_size = write.max(1);
        self.delete_batch_size = delete.max(1);
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn with_start_from(mut self, start_from: Option<DateTime<Utc>>) -> Self {
        self.start_from = start_from;
        self
    }

    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = graph.into();
        self
    }

    /// Classifies a distribution by its type URI.
    pub fn classify(&self, distribution: &Distribution) -> DistributionKind {
        match distribution.type_uri.as_deref() {
            Some(t) if t == self.content_distribution_type => DistributionKind::PrimaryContent,
            Some(t) if t == self.attachment_distribution_type => DistributionKind::Attachment,
            _ => DistributionKind::Other,
        }
    }
}

/// Parses the configured start-from override.
///
/// Accepts RFC 3339 timestamps. An empty value means no override.
pub fn parse_start_from(value: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|e| AppError::ConfigError(format!("Invalid start-from timestamp '{}': {}", raw, e)))
}

/// Converts a millisecond interval into a periodic trigger interval.
///
/// Zero and negative values disable periodic triggering.
pub fn periodic_interval(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
