//! Page reading for the recipe catalog
//!
//! This module provides:
//! - The [`PageReader`] seam the orchestrators fetch through
//! - An HTTP implementation with configured headers, cookies and throttling

mod rate_limit;

pub use rate_limit::*;

use crate::config::{CatalogConfig, HttpConfig};
use crate::error::{Error, Result};
use crate::parse::{parse_listing, parse_recipe, CompiledSelectors, ListingCard, RecipeFields};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Source of listing cards, recipe fields and image bytes
#[async_trait]
pub trait PageReader: Send + Sync {
    /// Cards on listing page `page`, in page order
    async fn fetch_listing_page(&self, page: u32) -> Result<Vec<ListingCard>>;

    /// Raw fields of the recipe at `link`.
    ///
    /// Missing required elements are [`Error::Extraction`].
    async fn fetch_record_fields(&self, link: &str) -> Result<RecipeFields>;

    /// Image bytes at `url`. A non-success status is [`Error::ImageFetch`].
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`PageReader`] over plain HTTP and CSS selectors
pub struct HtmlPageReader {
    client: Client,
    listing_template: String,
    selectors: CompiledSelectors,
    genre_separator: String,
    limiter: GlobalRateLimiter,
}

impl HtmlPageReader {
    pub fn new(catalog: &CatalogConfig, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .default_headers(default_headers(http)?)
            .timeout(Duration::from_secs(http.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            listing_template: catalog.listing_url.clone(),
            selectors: CompiledSelectors::compile(&catalog.selectors)?,
            genre_separator: catalog.genre_separator.clone(),
            limiter: GlobalRateLimiter::new(http.requests_per_second),
        })
    }

    /// Listing page URL for `page`
    pub fn listing_url(&self, page: u32) -> String {
        self.listing_template.replace("{page}", &page.to_string())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.limiter.wait().await;
        debug!("Fetching: {}", url);
        Ok(self.client.get(url).send().await?)
    }
}

fn default_headers(http: &HttpConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in &http.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }

    if !http.cookies.is_empty() {
        let cookie = http
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| Error::Config(format!("Invalid cookie value: {}", e)))?;
        headers.insert(COOKIE, value);
    }

    Ok(headers)
}

#[async_trait]
impl PageReader for HtmlPageReader {
    async fn fetch_listing_page(&self, page: u32) -> Result<Vec<ListingCard>> {
        let url = self.listing_url(page);
        let response = self.get(&url).await?.error_for_status()?;
        let content = response.text().await?;

        Ok(parse_listing(&content, &url, &self.selectors))
    }

    async fn fetch_record_fields(&self, link: &str) -> Result<RecipeFields> {
        let response = self.get(link).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::extraction(link, format!("HTTP {}", status)));
        }
        let content = response.text().await?;

        parse_recipe(&content, link, &self.selectors, &self.genre_separator)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let image_error = |reason: String| Error::ImageFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .get(url)
            .await
            .map_err(|e| image_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(image_error(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| image_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
