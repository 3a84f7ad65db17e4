//! Paginated traversal of upstream listings.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{Dataset, Distribution, Page, PageRequest};
use crate::traits::CatalogClient;

/// Collects every item of a paginated listing.
///
/// Pages are requested with zero-based numbers until
/// `pages_fetched * page_size >= total`. The first failing page aborts the
/// traversal; partial results are never returned.
pub async fn collect_pages<T, F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>, AppError>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, AppError>>,
{
    let size = page_size.max(1);
    let mut items = Vec::new();
    let mut number = 0;

    loop {
        let page = fetch_page(PageRequest { number, size }).await?;
        tracing::debug!(page = number, received = page.items.len(), total = page.total, "Fetched page");
        items.extend(page.items);
        number += 1;
        if number * size >= page.total {
            break;
        }
    }

    Ok(items)
}

/// Lists every dataset released after `since`, oldest first.
///
/// The catalog pages newest first; the collected list is reversed so the
/// fold sees ascending release dates.
pub async fn list_unconsumed_datasets<C: CatalogClient>(
    client: &C,
    since: DateTime<Utc>,
    page_size: usize,
) -> Result<Vec<Dataset>, AppError> {
    let mut datasets =
        collect_pages(page_size, |page| client.fetch_dataset_page(since, page)).await?;
    datasets.reverse();
    Ok(datasets)
}

pub async fn list_distributions<C: CatalogClient>(
    client: &C,
    link: &str,
    page_size: usize,
) -> Result<Vec<Distribution>, AppError> {
    collect_pages(page_size, |page| client.fetch_distribution_page(link, page)).await
}
