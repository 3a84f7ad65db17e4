//! Tethys Core - incremental dataset sync engine.
//!
//! This crate mirrors datasets published by an upstream catalog into a
//! local graph store, one sync task at a time:
//!
//! - **Domain models**: [`Dataset`], [`Distribution`], [`FileRecord`], [`Statement`]
//! - **Task lifecycle**: [`TaskStatus`], [`SyncTask`] and the [`SyncService`] state machine
//! - **Scheduling**: [`Scheduler`] with single-flight [`TriggerOutcome`]s and crash recovery
//! - **Pipeline**: [`DatasetConsumer`] supersedes, writes and mirrors one dataset
//! - **Traits**: [`CatalogClient`], [`TaskQueue`], [`FileRegistry`], [`GraphStore`]
//! - **Progress reporting**: [`SyncReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits. `tethys-client`
//! implements [`CatalogClient`] over HTTP; `tethys-store` implements the
//! three store traits over SPARQL.
//!
//! # Example
//!
//! ```ignore
//! use tethys_core::{FileShare, Scheduler, SyncService, TracingReporter};
//!
//! let service = SyncService::with_config(tasks.clone(), catalog, files, graph, share, config);
//! let scheduler = Scheduler::new(tasks, service, TracingReporter);
//! scheduler.recover_interrupted().await?;
//! let outcome = scheduler.trigger().await?;
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod statement;
pub mod storage;
pub mod sync;
pub mod task;
pub mod traits;
pub mod writer;

// Configuration
pub use config::{HttpConfig, StoreConfig, SyncConfig};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{Dataset, Distribution, DistributionKind, FileRecord, Page, PageRequest};
pub use statement::{Statement, Term};

// Task lifecycle
pub use task::{Progress, SyncTask, TaskRecord, TaskStatus, TaskSummary};

// Progress reporting
pub use progress::{SilentReporter, SyncEvent, SyncReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{CatalogClient, FileRegistry, GraphStore, TaskQueue};

// Services (generic over trait implementations)
pub use pipeline::DatasetConsumer;
pub use scheduler::{PendingTask, RunningTask, Scheduler, TriggerOutcome};
pub use storage::{FileShare, FileStat};
pub use sync::SyncService;
pub use writer::BatchedWriter;
