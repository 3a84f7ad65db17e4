//! Per-dataset consumption pipeline.
//!
//! Consuming a dataset runs four steps in order:
//!
//! ```text
//! 1. supersede      retract the statements of the previous version
//! 2. distributions  fetch the dataset's distribution listing
//! 3. content        parse, augment, persist locally, insert, register
//! 4. attachments    mirror binaries into pre-registered locations
//! ```
//!
//! Steps 1 to 3 are hard failures: any error aborts the dataset. Step 4
//! never fails the dataset; individual download errors are reported and
//! skipped.

use crate::config::{SKOLEM_NAMESPACE, SyncConfig};
use crate::cursor;
use crate::error::AppError;
use crate::models::{Dataset, DistributionKind, FileRecord};
use crate::progress::{SyncEvent, SyncReporter};
use crate::statement::{self, Statement};
use crate::storage::FileShare;
use crate::traits::{CatalogClient, FileRegistry, GraphStore};
use crate::writer::BatchedWriter;

/// Applies single datasets to the target store.
pub struct DatasetConsumer<C, F, G>
where
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    catalog: C,
    files: F,
    writer: BatchedWriter<G>,
    share: FileShare,
    config: SyncConfig,
}

impl<C, F, G> Clone for DatasetConsumer<C, F, G>
where
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            files: self.files.clone(),
            writer: self.writer.clone(),
            share: self.share.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, F, G> DatasetConsumer<C, F, G>
where
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    pub fn new(catalog: C, files: F, graph: G, share: FileShare, config: SyncConfig) -> Self {
        let writer = BatchedWriter::new(graph, config.write_batch_size, config.delete_batch_size);
        Self {
            catalog,
            files,
            writer,
            share,
            config,
        }
    }

    /// Consumes one dataset.
    ///
    /// The dataset's distributions are replaced by the fetched listing.
    pub async fn consume<R: SyncReporter>(
        &self,
        dataset: &mut Dataset,
        reporter: &R,
    ) -> Result<(), AppError> {
        self.remove_previous_version(dataset, reporter).await?;
        dataset.distributions =
            cursor::list_distributions(&self.catalog, &dataset.distributions_link, self.config.page_size)
                .await?;
        self.write_content(dataset, reporter).await?;
        self.mirror_attachments(dataset, reporter).await;
        Ok(())
    }

    /// Retracts the statements of the dataset this one supersedes.
    ///
    /// A dataset without a previous version, or whose previous version has
    /// no registered artifact, is a no-op. Returns the number of statements
    /// sent for deletion.
    pub async fn remove_previous_version<R: SyncReporter>(
        &self,
        dataset: &Dataset,
        reporter: &R,
    ) -> Result<usize, AppError> {
        let Some(link) = dataset.previous_version_link.as_deref() else {
            return Ok(0);
        };
        let Some(predecessor) = self.catalog.fetch_previous_version(link).await? else {
            return Ok(0);
        };

        let removed = self.remove_dataset_statements(&predecessor).await?;
        if removed > 0 {
            reporter.report(SyncEvent::PredecessorRemoved {
                dataset_id: &dataset.id,
                predecessor: &predecessor,
                statements: removed,
            });
        }
        Ok(removed)
    }

    /// Retracts every statement recorded in the artifacts of `dataset_uri`.
    ///
    /// Deleting statements that are already gone is harmless, so repeating
    /// this for the same dataset is safe.
    pub async fn remove_dataset_statements(&self, dataset_uri: &str) -> Result<usize, AppError> {
        let mut removed = 0;
        for physical_uri in self.files.find_dataset_files(dataset_uri).await? {
            let contents = self.share.read_to_string(&physical_uri).await?;
            let statements = statement::parse_turtle(&contents, &skolem_base(&physical_uri))?;
            self.writer.delete(&self.config.graph, &statements).await?;
            removed += statements.len();
        }
        Ok(removed)
    }

    /// Writes the primary content of a dataset.
    ///
    /// The durable local copy is written before the statements are inserted
    /// and registered, so a registered artifact always has its file.
    /// Returns the number of statements inserted.
    pub async fn write_content<R: SyncReporter>(
        &self,
        dataset: &Dataset,
        reporter: &R,
    ) -> Result<usize, AppError> {
        let Some(content) = dataset
            .distributions
            .iter()
            .find(|d| self.config.classify(d) == DistributionKind::PrimaryContent)
        else {
            reporter.report(SyncEvent::ContentMissing {
                dataset_id: &dataset.id,
            });
            return Ok(0);
        };

        let body = self.catalog.fetch_content(&content.download_url).await?;
        let statements = self.prepare_statements(&body, &dataset.id)?;

        let file_name = format!("{}.ttl", dataset.id);
        let physical_uri = self.share.uri_for(&file_name);
        let stat = self
            .share
            .write(&physical_uri, statement::serialize(&statements).as_bytes())
            .await?;

        self.writer.insert(&self.config.graph, &statements).await?;

        let record = FileRecord::turtle(&dataset.uri, &physical_uri, &file_name, stat.size, stat.created);
        self.files.register(&record).await?;

        reporter.report(SyncEvent::ContentWritten {
            dataset_id: &dataset.id,
            statements: statements.len(),
            physical_uri: &physical_uri,
        });
        Ok(statements.len())
    }

    fn prepare_statements(&self, body: &str, dataset_id: &str) -> Result<Vec<Statement>, AppError> {
        let mut statements =
            statement::parse_turtle(body, &format!("{}{}/", SKOLEM_NAMESPACE, dataset_id))?;
        statement::augment_documents(&mut statements, &self.config.document_classification);
        Ok(statements)
    }

    /// Mirrors attachment binaries. Never fails; returns the number copied.
    pub async fn mirror_attachments<R: SyncReporter>(&self, dataset: &Dataset, reporter: &R) -> usize {
        let mut copied = 0;
        let attachments = dataset
            .distributions
            .iter()
            .filter(|d| self.config.classify(d) == DistributionKind::Attachment);

        for attachment in attachments {
            let url = attachment.download_url.as_str();
            let location = match attachment.subject.as_deref() {
                Some(subject) => self.files.find_attachment_location(subject).await,
                None => Ok(None),
            };

            let result = match location {
                Ok(Some(physical_uri)) => self.download(url, &physical_uri).await,
                Ok(None) => {
                    reporter.report(SyncEvent::AttachmentSkipped {
                        dataset_id: &dataset.id,
                        download_url: url,
                    });
                    continue;
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => copied += 1,
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(SyncEvent::AttachmentFailed {
                        dataset_id: &dataset.id,
                        download_url: url,
                        error: &error,
                    });
                }
            }
        }

        reporter.report(SyncEvent::AttachmentsMirrored {
            dataset_id: &dataset.id,
            copied,
        });
        copied
    }

    async fn download(&self, url: &str, physical_uri: &str) -> Result<u64, AppError> {
        let path = self.share.prepare(physical_uri).await?;
        self.catalog.download_to(url, &path).await
    }
}

/// Skolem base for re-reading a local copy. Local copies never contain
/// blank nodes, so this only guards against hand-edited files.
fn skolem_base(physical_uri: &str) -> String {
    let name = physical_uri.rsplit('/').next().unwrap_or(physical_uri);
    format!("{}local/{}/", SKOLEM_NAMESPACE, name)
}
