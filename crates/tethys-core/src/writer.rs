//! Batched statement writes against the target store.

use tracing::debug;

use crate::error::AppError;
use crate::statement::Statement;
use crate::traits::GraphStore;

/// Splits statement sets into bounded requests.
///
/// Batches are sent one after another in input order. The first failing
/// batch aborts the write; earlier batches stay applied.
#[derive(Clone)]
pub struct BatchedWriter<G: GraphStore> {
    store: G,
    write_batch_size: usize,
    delete_batch_size: usize,
}

impl<G: GraphStore> BatchedWriter<G> {
    pub fn new(store: G, write_batch_size: usize, delete_batch_size: usize) -> Self {
        Self {
            store,
            write_batch_size: write_batch_size.max(1),
            delete_batch_size: delete_batch_size.max(1),
        }
    }

    /// Inserts `statements` into `graph`. Returns the number of requests sent.
    pub async fn insert(&self, graph: &str, statements: &[Statement]) -> Result<usize, AppError> {
        let mut batches = 0;
        for (index, batch) in statements.chunks(self.write_batch_size).enumerate() {
            let offset = index * self.write_batch_size;
            debug!(graph, from = offset, to = offset + batch.len(), "Inserting statements batch");
            self.store.insert_data(graph, batch).await?;
            batches += 1;
        }
        Ok(batches)
    }

    /// Deletes `statements` from `graph`. Returns the number of requests sent.
    pub async fn delete(&self, graph: &str, statements: &[Statement]) -> Result<usize, AppError> {
        let mut batches = 0;
        for (index, batch) in statements.chunks(self.delete_batch_size).enumerate() {
            let offset = index * self.delete_batch_size;
            debug!(graph, from = offset, to = offset + batch.len(), "Deleting statements batch");
            self.store.delete_data(graph, batch).await?;
            batches += 1;
        }
        Ok(batches)
    }
}
