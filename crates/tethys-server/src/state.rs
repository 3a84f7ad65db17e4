use tethys_client::CatalogHttpClient;
use tethys_core::{AppError, FileShare, Scheduler, SyncService, TracingReporter};
use tethys_store::{FileRepository, GraphRepository, SparqlClient, TaskRepository};

use crate::config::ServerConfig;

/// Scheduler wired to the HTTP catalog and the SPARQL store.
pub type AppScheduler =
    Scheduler<TaskRepository, CatalogHttpClient, FileRepository, GraphRepository, TracingReporter>;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Scheduler behind the trigger endpoint and the periodic loop
    pub scheduler: AppScheduler,
}

impl AppState {
    /// Builds the catalog client, store repositories and scheduler from configuration.
    ///
    /// Nothing is contacted here; connection problems surface on the first trigger.
    pub fn new(config: &ServerConfig) -> Result<Self, AppError> {
        let sync_config = config.sync_config()?;
        let catalog = CatalogHttpClient::with_config(&config.sync_base_url, &config.http_config())?;

        let sparql = SparqlClient::new(&config.store_config())?;
        let tasks = TaskRepository::new(sparql.clone());
        let files = FileRepository::new(sparql.clone(), sync_config.graph.clone());
        let graph = GraphRepository::new(sparql);

        let share = FileShare::new(&config.share_dir);
        let service =
            SyncService::with_config(tasks.clone(), catalog, files, graph, share, sync_config);

        Ok(Self {
            scheduler: Scheduler::new(tasks, service, TracingReporter),
        })
    }
}
