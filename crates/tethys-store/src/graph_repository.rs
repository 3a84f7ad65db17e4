//! Graph data writes.
//!
//! One call is one `INSERT DATA` or `DELETE DATA` request; batching
//! happens upstream in `tethys_core::BatchedWriter`.

use tethys_core::error::AppError;
use tethys_core::statement::{Statement, escape_uri, serialize};
use tethys_core::traits::GraphStore;

use crate::sparql::SparqlClient;

/// Triplestore implementation of [`GraphStore`].
#[derive(Clone)]
pub struct GraphRepository {
    sparql: SparqlClient,
}

impl GraphRepository {
    pub fn new(sparql: SparqlClient) -> Self {
        Self { sparql }
    }
}

fn data_update(operation: &str, graph: &str, statements: &[Statement]) -> String {
    format!(
        "{} DATA {{\n  GRAPH {} {{\n{}\n  }}\n}}",
        operation,
        escape_uri(graph),
        serialize(statements)
    )
}

impl GraphStore for GraphRepository {
    async fn insert_data(&self, graph: &str, statements: &[Statement]) -> Result<(), AppError> {
        if statements.is_empty() {
            return Ok(());
        }
        self.sparql
            .update(&data_update("INSERT", graph, statements))
            .await
    }

    async fn delete_data(&self, graph: &str, statements: &[Statement]) -> Result<(), AppError> {
        if statements.is_empty() {
            return Ok(());
        }
        self.sparql
            .update(&data_update("DELETE", graph, statements))
            .await
    }
}
