//! Client for the upstream dataset catalog.
//!
//! The catalog speaks JSON:API (`application/vnd.api+json`). Datasets are
//! listed from `<base>/datasets`, filtered on release date and sorted newest
//! first; every other resource is reached through the `related` links the
//! catalog hands out.
//!
//! ```text
//! GET /datasets?page[size]=20&page[number]=0
//!              &filter[:gt:release-date]=2024-06-01T08:00:00.000Z
//!              &sort=-release-date
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use tethys_core::error::AppError;
use tethys_core::models::{Dataset, Distribution, Page, PageRequest};
use tethys_core::traits::CatalogClient;
use tethys_core::HttpConfig;

/// Media type of every catalog request and response.
pub const JSON_API: &str = "application/vnd.api+json";

// =============================================================================
// JSON:API documents
// =============================================================================

/// Collection document with a total count.
#[derive(Deserialize, Debug)]
struct CollectionDocument<A> {
    data: Vec<Resource<A>>,
    meta: CollectionMeta,
}

#[derive(Deserialize, Debug)]
struct CollectionMeta {
    count: usize,
}

/// Single-resource document; `data` is `null` for an empty relationship.
#[derive(Deserialize, Debug)]
struct SingleDocument<A> {
    data: Option<Resource<A>>,
}

#[derive(Deserialize, Debug)]
struct Resource<A> {
    id: String,
    attributes: A,
    #[serde(default)]
    relationships: HashMap<String, Relationship>,
}

#[derive(Deserialize, Debug, Default)]
struct Relationship {
    #[serde(default)]
    links: Option<RelationshipLinks>,
}

#[derive(Deserialize, Debug, Default)]
struct RelationshipLinks {
    related: Option<String>,
}

impl<A> Resource<A> {
    fn related_link(&self, name: &str) -> Option<String> {
        self.relationships
            .get(name)
            .and_then(|r| r.links.as_ref())
            .and_then(|l| l.related.clone())
    }
}

/// Attributes of a catalog dataset.
#[derive(Deserialize, Debug)]
pub struct DatasetAttributes {
    pub uri: String,
    #[serde(rename = "release-date")]
    pub release_date: DateTime<Utc>,
}

/// Attributes of a catalog distribution.
#[derive(Deserialize, Debug)]
pub struct DistributionAttributes {
    #[serde(rename = "type", default)]
    pub type_uri: Option<String>,
    #[serde(rename = "download-url")]
    pub download_url: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UriAttributes {
    uri: String,
}

impl Resource<DatasetAttributes> {
    fn into_dataset(self) -> Result<Dataset, AppError> {
        let distributions_link = self.related_link("distributions").ok_or_else(|| {
            AppError::ClientError(format!("Dataset {} has no distributions link", self.id))
        })?;
        let previous_version_link = self.related_link("previous-version");
        Ok(Dataset {
            id: self.id,
            uri: self.attributes.uri,
            release_date: self.attributes.release_date,
            distributions_link,
            previous_version_link,
            distributions: Vec::new(),
        })
    }
}

impl From<Resource<DistributionAttributes>> for Distribution {
    fn from(resource: Resource<DistributionAttributes>) -> Self {
        Distribution {
            id: resource.id,
            type_uri: resource.attributes.type_uri,
            download_url: resource.attributes.download_url,
            subject: resource.attributes.subject,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the upstream catalog.
#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl CatalogHttpClient {
    /// Creates a client for the catalog at `base_url` with default settings.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_config(base_url, &HttpConfig::default())
    }

    pub fn with_config(base_url: &str, config: &HttpConfig) -> Result<Self, AppError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a catalog link, relative or absolute, against the base URL.
    fn resolve(&self, link: &str) -> Result<Url, AppError> {
        self.base_url
            .join(link)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", link, e)))
    }

    fn datasets_url(&self, since: DateTime<Utc>, page: PageRequest) -> Result<Url, AppError> {
        let mut url = self.resolve("datasets")?;
        url.query_pairs_mut()
            .append_pair("page[size]", &page.size.to_string())
            .append_pair("page[number]", &page.number.to_string())
            .append_pair(
                "filter[:gt:release-date]",
                &since.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .append_pair("sort", "-release-date");
        Ok(url)
    }

    /// Sends a GET and fails on any non-success status.
    async fn get(&self, url: Url, accept: &str) -> Result<Response, AppError> {
        debug!(%url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        let resp = self.get(url, JSON_API).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn map_request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else {
            AppError::ClientError(e.to_string())
        }
    }

    /// Streams the response body into `partial` and returns the byte count.
    async fn write_partial(&self, resp: Response, partial: &Path) -> Result<u64, AppError> {
        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_request_error(e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, AppError> {
    let mut url =
        Url::parse(base_url).map_err(|_| AppError::InvalidUrl(base_url.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(AppError::InvalidUrl(base_url.to_string()));
    }
    // Url::join replaces the last path segment unless the path ends in '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

impl CatalogClient for CatalogHttpClient {
    async fn fetch_dataset_page(
        &self,
        since: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Dataset>, AppError> {
        let url = self.datasets_url(since, page)?;
        let doc: CollectionDocument<DatasetAttributes> = self.get_json(url).await?;
        let items = doc
            .data
            .into_iter()
            .map(Resource::into_dataset)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: doc.meta.count,
        })
    }

    async fn fetch_distribution_page(
        &self,
        link: &str,
        page: PageRequest,
    ) -> Result<Page<Distribution>, AppError> {
        let mut url = self.resolve(link)?;
        url.query_pairs_mut()
            .append_pair("page[size]", &page.size.to_string())
            .append_pair("page[number]", &page.number.to_string());
        let doc: CollectionDocument<DistributionAttributes> = self.get_json(url).await?;
        Ok(Page {
            items: doc.data.into_iter().map(Distribution::from).collect(),
            total: doc.meta.count,
        })
    }

    async fn fetch_previous_version(&self, link: &str) -> Result<Option<String>, AppError> {
        let url = self.resolve(link)?;
        let doc: SingleDocument<UriAttributes> = self.get_json(url).await?;
        Ok(doc.data.map(|resource| resource.attributes.uri))
    }

    async fn fetch_content(&self, url: &str) -> Result<String, AppError> {
        let url = self.resolve(url)?;
        let resp = self.get(url, "text/turtle, */*").await?;
        resp.text().await.map_err(|e| self.map_request_error(e))
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, AppError> {
        let url = self.resolve(url)?;
        let resp = self.get(url, "*/*").await?;

        let partial = partial_path(dest);
        let result = async {
            let written = self.write_partial(resp, &partial).await?;
            tokio::fs::rename(&partial, dest).await?;
            Ok::<_, AppError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!(path = %dest.display(), bytes = written, "Download complete");
                Ok(written)
            }
            Err(e) => {
                // A partial file must never be mistaken for a finished one.
                tokio::fs::remove_file(&partial).await.ok();
                Err(e)
            }
        }
    }
}
