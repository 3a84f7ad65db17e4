//! File records in the triplestore.
//!
//! A derived artifact is described by two `nfo:FileDataObject`s: a logical
//! file (the resource other data points at) and a physical file on the
//! share that names the logical one as its `nie:dataSource`. The dataset
//! links to the logical file through `prov:value`.

use tracing::debug;

use tethys_core::error::AppError;
use tethys_core::models::FileRecord;
use tethys_core::statement::{escape_datetime, escape_int, escape_string, escape_uri};
use tethys_core::traits::FileRegistry;

use crate::sparql::{PREFIXES, SparqlClient};

/// Triplestore implementation of the file registry.
#[derive(Clone)]
pub struct FileRepository {
    sparql: SparqlClient,
    graph: String,
}

impl FileRepository {
    pub fn new(sparql: SparqlClient, graph: impl Into<String>) -> Self {
        Self {
            sparql,
            graph: graph.into(),
        }
    }
}

fn select_dataset_files(graph: &str, dataset_uri: &str) -> String {
    format!(
        "{PREFIXES}
SELECT DISTINCT ?physical WHERE {{
  GRAPH {graph} {{
    {dataset} prov:value ?logical .
    ?physical a nfo:FileDataObject ;
      nie:dataSource ?logical .
  }}
}} ORDER BY ?physical",
        graph = escape_uri(graph),
        dataset = escape_uri(dataset_uri),
    )
}

fn select_attachment_location(subject_uri: &str) -> String {
    format!(
        "{PREFIXES}
SELECT ?physical WHERE {{
  GRAPH ?g {{
    {subject} a nfo:FileDataObject .
    ?physical nie:dataSource {subject} .
  }}
}} LIMIT 1",
        subject = escape_uri(subject_uri),
    )
}

fn insert_file_record(graph: &str, record: &FileRecord) -> String {
    let name = escape_string(&record.file_name);
    let format = escape_string(&record.format);
    let size = escape_int(record.size);
    let extension = escape_string(&record.extension);
    let created = escape_datetime(record.created);
    let logical = escape_uri(&record.logical_uri);
    format!(
        "{PREFIXES}
INSERT DATA {{
  GRAPH {graph} {{
    {logical} a nfo:FileDataObject ;
      mu:uuid {logical_id} ;
      nfo:fileName {name} ;
      dct:format {format} ;
      nfo:fileSize {size} ;
      dbpedia:fileExtension {extension} ;
      dct:creator {creator} ;
      dct:created {created} .
    {physical} a nfo:FileDataObject ;
      mu:uuid {physical_id} ;
      nfo:fileName {name} ;
      dct:format {format} ;
      nfo:fileSize {size} ;
      dbpedia:fileExtension {extension} ;
      dct:created {created} ;
      nie:dataSource {logical} .
    {dataset} prov:value {logical} .
  }}
}}",
        graph = escape_uri(graph),
        logical_id = escape_string(&record.logical_id.to_string()),
        creator = escape_uri(&record.creator),
        physical = escape_uri(&record.physical_uri),
        physical_id = escape_string(&record.physical_id.to_string()),
        dataset = escape_uri(&record.dataset_uri),
    )
}

impl FileRegistry for FileRepository {
    async fn find_dataset_files(&self, dataset_uri: &str) -> Result<Vec<String>, AppError> {
        let rows = self
            .sparql
            .query(&select_dataset_files(&self.graph, dataset_uri))
            .await?;
        rows.iter()
            .map(|row| row.require("physical").map(str::to_string))
            .collect()
    }

    async fn find_attachment_location(&self, subject_uri: &str) -> Result<Option<String>, AppError> {
        let rows = self
            .sparql
            .query(&select_attachment_location(subject_uri))
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("physical"))
            .map(str::to_string))
    }

    async fn register(&self, record: &FileRecord) -> Result<(), AppError> {
        self.sparql
            .update(&insert_file_record(&self.graph, record))
            .await?;
        debug!(
            dataset = %record.dataset_uri,
            file = %record.physical_uri,
            "Registered file record"
        );
        Ok(())
    }
}
