use crate::parser::parse_product_page;
use crate::types::ScrapedItem;

use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Anything that can turn a product page URL into a scraped item.
pub trait PriceSource {
    fn fetch_item(&self, url: &str)
    -> impl Future<Output = Result<ScrapedItem, ScraperError>> + Send;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client })
    }

    async fn get_html(&self, url: Url) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

impl PriceSource for WebScraper {
    async fn fetch_item(&self, url: &str) -> Result<ScrapedItem, ScraperError> {
        let url = validate_url(url)?;
        log::info!("Fetching product page: {}", url);
        let html = self.get_html(url).await?;
        Ok(parse_product_page(&html))
    }
}

pub fn validate_url(url: &str) -> Result<Url, ScraperError> {
    let invalid = |reason: String| ScraperError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}
