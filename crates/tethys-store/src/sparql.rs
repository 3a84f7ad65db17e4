//! Minimal SPARQL 1.1 protocol client.
//!
//! Queries and updates are sent as url-encoded form posts. Every request
//! carries `mu-auth-sudo: true` so the authorization layer in front of the
//! triplestore lets the service write to any graph.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, header};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use tethys_core::StoreConfig;
use tethys_core::error::AppError;

/// Media type requested for SELECT results.
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Header that lifts graph access restrictions for the service.
pub const SUDO_HEADER: &str = "mu-auth-sudo";

/// Prefix declarations shared by every query this crate builds.
pub const PREFIXES: &str = "\
PREFIX mu: <http://mu.semte.ch/vocabularies/core/>
PREFIX ext: <http://mu.semte.ch/vocabularies/ext/>
PREFIX adms: <http://www.w3.org/ns/adms#>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX prov: <http://www.w3.org/ns/prov#>
PREFIX nfo: <http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#>
PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>
PREFIX dbpedia: <http://dbpedia.org/ontology/>
";

// =============================================================================
// Result documents
// =============================================================================

#[derive(Deserialize, Debug)]
struct ResultsDocument {
    results: ResultSet,
}

#[derive(Deserialize, Debug)]
struct ResultSet {
    bindings: Vec<Binding>,
}

/// One bound value in a result row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BindingValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// One result row, keyed by variable name.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Binding(HashMap<String, BindingValue>);

impl Binding {
    /// Value of `var`, if bound.
    pub fn get(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(|v| v.value.as_str())
    }

    /// Value of `var`, failing when the row leaves it unbound.
    pub fn require(&self, var: &str) -> Result<&str, AppError> {
        self.get(var)
            .ok_or_else(|| AppError::StoreError(format!("Result row misses ?{}", var)))
    }

    /// Datetime value of `var`, if bound.
    pub fn datetime(&self, var: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        self.get(var).map(parse_datetime).transpose()
    }
}

/// Parses an `xsd:dateTime` lexical value.
///
/// Values without an offset are read as UTC; some triplestores drop the
/// trailing `Z` when echoing stored datetimes.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| AppError::ParseError(format!("Invalid datetime '{}': {}", value, e)))
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for a SPARQL endpoint.
#[derive(Clone)]
pub struct SparqlClient {
    client: Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl SparqlClient {
    pub fn new(config: &StoreConfig) -> Result<Self, AppError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| AppError::InvalidUrl(config.endpoint.clone()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Runs a SELECT query and returns its rows.
    pub async fn query(&self, query: &str) -> Result<Vec<Binding>, AppError> {
        let body = self.post("query", query).await?;
        let doc: ResultsDocument = serde_json::from_str(&body)?;
        Ok(doc.results.bindings)
    }

    /// Runs an update request.
    pub async fn update(&self, update: &str) -> Result<(), AppError> {
        self.post("update", update).await.map(|_| ())
    }

    async fn post(&self, field: &str, text: &str) -> Result<String, AppError> {
        debug!(endpoint = %self.endpoint, field, bytes = text.len(), "SPARQL request");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, SPARQL_RESULTS_JSON)
            .header(SUDO_HEADER, "true")
            .form(&[(field, text)])
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(AppError::StoreError(format!(
                "SPARQL {} failed with HTTP {}: {}",
                field,
                status.as_u16(),
                detail.trim()
            )));
        }
        resp.text().await.map_err(|e| self.map_request_error(e))
    }

    fn map_request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::StoreError(format!("Triplestore unreachable: {}", e))
        } else {
            AppError::StoreError(e.to_string())
        }
    }
}
