use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SitemapResult;

/// Explicit request context for one sitemap rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapRequest {
    /// Absolute base URL entries are resolved against
    pub base_url: String,
    /// Sitemap key; `None` renders the index
    #[serde(default)]
    pub sitemap: Option<String>,
    /// Zero-based page within the sitemap
    #[serde(default)]
    pub page: usize,
    /// Page type number the sitemap is served under, if any
    #[serde(default)]
    pub page_type: Option<u32>,
}

impl SitemapRequest {
    pub fn index(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            sitemap: None,
            page: 0,
            page_type: None,
        }
    }

    pub fn sitemap(base_url: impl Into<String>, sitemap: impl Into<String>, page: usize) -> Self {
        Self {
            base_url: base_url.into(),
            sitemap: Some(sitemap.into()),
            page,
            page_type: None,
        }
    }

    /// URL of one page of a sitemap, as listed in the index
    pub fn sitemap_url(&self, key: &str, page: usize) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        match self.page_type {
            Some(page_type) => format!(
                "{}{}type={}&sitemap={}&page={}",
                self.base_url, separator, page_type, key, page
            ),
            None => format!("{}{}sitemap={}&page={}", self.base_url, separator, key, page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapItem {
    pub loc: String,
    pub last_mod: Option<DateTime<Utc>>,
}

/// Data behind one configured sitemap
#[async_trait]
pub trait SitemapDataProvider: Send + Sync {
    /// Number of sitemap pages; zero hides the sitemap from the index
    async fn number_of_pages(&self) -> SitemapResult<usize>;

    async fn last_modified(&self) -> SitemapResult<Option<DateTime<Utc>>>;

    /// Items of one zero-based page
    async fn items(&self, page: usize) -> SitemapResult<Vec<SitemapItem>>;
}
