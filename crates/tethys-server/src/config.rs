use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use tethys_core::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CATALOG_URL, parse_start_from, periodic_interval,
};
use tethys_core::{AppError, HttpConfig, StoreConfig, SyncConfig};

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug, Clone)]
#[command(name = "tethys-server")]
#[command(author, version, about = "Incremental dataset sync service")]
pub struct ServerConfig {
    /// Periodic trigger interval in milliseconds; zero or negative disables it
    #[arg(long, env = "INGEST_INTERVAL", default_value_t = -1, allow_negative_numbers = true)]
    pub ingest_interval: i64,

    /// Base URL of the upstream catalog
    #[arg(long, env = "SYNC_BASE_URL", default_value = DEFAULT_CATALOG_URL)]
    pub sync_base_url: String,

    /// Statements per insert request
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Statements per delete request
    #[arg(long, env = "UPDATE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub update_batch_size: usize,

    /// Initial watermark when no task has recorded one (RFC 3339)
    #[arg(long, env = "START_FROM_DATASET_TIMESTAMP")]
    pub start_from_dataset_timestamp: Option<String>,

    /// SPARQL endpoint of the target store
    #[arg(long, env = "MU_SPARQL_ENDPOINT", default_value = "http://database:8890/sparql")]
    pub sparql_endpoint: String,

    /// Root directory of the local file share
    #[arg(long, env = "SHARE_DIR", default_value = "/share")]
    pub share_dir: PathBuf,

    /// Upstream request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Store request timeout in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 60)]
    pub store_timeout_secs: u64,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "80")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
}

impl ServerConfig {
    /// Sync settings derived from the batch sizes and start-from override.
    pub fn sync_config(&self) -> Result<SyncConfig, AppError> {
        let start_from = parse_start_from(self.start_from_dataset_timestamp.as_deref())?;
        Ok(SyncConfig::default()
            .with_batch_sizes(self.batch_size, self.update_batch_size)
            .with_start_from(start_from))
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            ..HttpConfig::default()
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoint: self.sparql_endpoint.clone(),
            timeout: Duration::from_secs(self.store_timeout_secs),
        }
    }

    /// Periodic trigger interval, if enabled.
    pub fn ingest_interval(&self) -> Option<Duration> {
        periodic_interval(self.ingest_interval)
    }
}
