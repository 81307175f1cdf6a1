use std::path::PathBuf;

use crate::scraper::{PriceSource, ScraperError};
use crate::store::{PriceBook, StoreError};
use crate::types::{PriceRecord, ScrapedItem};

use chrono::{DateTime, Local};
use futures::{StreamExt, stream};
use serde::Serialize;

pub const DEFAULT_FILE_NAME: &str = "scraped_prices.xlsx";
pub const DEFAULT_SHEET_NAME: &str = "Scraped Data";
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Please enter a URL.")]
    EmptyUrl,
    #[error("URL already exists in the database.")]
    Duplicate(String),
    #[error("No data to update.")]
    NoData,
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ScraperError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub sheet_name: String,
    /// Maximum number of product pages fetched at once during a refresh.
    pub concurrency: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FILE_NAME),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub total: usize,
    pub updated: usize,
    /// Rows without a URL.
    pub skipped: usize,
    pub failed: Vec<RefreshFailure>,
    pub refreshed_at: DateTime<Local>,
}

impl std::fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nRefresh summary ({}):", self.refreshed_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "  Rows:    {}", self.total)?;
        writeln!(f, "  Updated: {}", self.updated)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        writeln!(f, "  Failed:  {}", self.failed.len())?;
        for failure in &self.failed {
            writeln!(f, "    {} - {}", failure.url, failure.error)?;
        }
        Ok(())
    }
}

/// Adds, refreshes and lists tracked items against one workbook.
#[derive(Debug, Clone)]
pub struct PriceTracker<S> {
    source: S,
    config: StoreConfig,
}

impl<S: PriceSource> PriceTracker<S> {
    pub fn new(source: S, config: StoreConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open(&self) -> Result<PriceBook, StoreError> {
        PriceBook::open_or_create(&self.config.path, &self.config.sheet_name)
    }

    pub fn records(&self) -> Result<Vec<PriceRecord>, TrackerError> {
        Ok(self.open()?.into_records())
    }

    pub async fn preview(&self, url: &str) -> Result<ScrapedItem, TrackerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TrackerError::EmptyUrl);
        }
        self.source
            .fetch_item(url)
            .await
            .map_err(|source| TrackerError::Fetch {
                url: url.to_string(),
                source,
            })
    }

    pub async fn add_url(&self, url: &str) -> Result<PriceRecord, TrackerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TrackerError::EmptyUrl);
        }

        let mut book = self.open()?;
        if book.contains_url(url) {
            return Err(TrackerError::Duplicate(url.to_string()));
        }

        let item = self.preview(url).await?;
        let record = PriceRecord::from_scraped(item, url);

        book.append(record.clone());
        book.save()?;
        log::info!("Added '{}' ({})", record.item, record.url);

        Ok(record)
    }

    /// Re-fetches every stored URL and overwrites its row. Rows whose fetch fails keep
    /// their previous values.
    pub async fn update_all<F>(&self, mut on_progress: F) -> Result<RefreshReport, TrackerError>
    where
        F: FnMut(RefreshProgress),
    {
        let mut book = self.open()?;
        let total = book.len();
        if total == 0 {
            return Err(TrackerError::NoData);
        }

        let targets: Vec<(usize, String)> = book
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.url.is_empty())
            .map(|(idx, r)| (idx, r.url.clone()))
            .collect();
        let skipped = total - targets.len();
        if skipped > 0 {
            log::warn!("Skipping {} row(s) without a URL", skipped);
        }

        let mut processed = 0;
        let mut advance = |processed: &mut usize| {
            *processed += 1;
            log::info!(
                "Updating prices... Processed {}/{} rows.",
                processed,
                total
            );
            on_progress(RefreshProgress {
                processed: *processed,
                total,
            });
        };

        for _ in 0..skipped {
            advance(&mut processed);
        }

        let mut updated = 0;
        let mut failed = Vec::new();

        let mut results = stream::iter(targets)
            .map(|(idx, url)| async move {
                let result = self.source.fetch_item(&url).await;
                (idx, url, result)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((idx, url, result)) = results.next().await {
            match result {
                Ok(item) => {
                    book.records_mut()[idx].apply(item);
                    updated += 1;
                }
                Err(e) => {
                    log::warn!("Error updating {}: {}", url, e);
                    failed.push(RefreshFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
            advance(&mut processed);
        }

        book.save()?;

        Ok(RefreshReport {
            total,
            updated,
            skipped,
            failed,
            refreshed_at: Local::now(),
        })
    }
}
