use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use serde::Deserialize;

use super::provider::{SitemapDataProvider, SitemapItem, SitemapRequest};
use crate::database::entities::records::{self, Entity as Records};
use crate::database::entities::{RecordKind, RecordStatus};
use crate::errors::{RelationError, SitemapError, SitemapResult};

fn default_kind() -> RecordKind {
    RecordKind::Page
}

fn default_items_per_page() -> usize {
    1000
}

fn default_url_pattern() -> String {
    "{base}?id={id}".to_string()
}

/// `config` block of a sitemap entry using the `records` provider
#[derive(Debug, Clone, Deserialize)]
pub struct RecordsProviderConfig {
    #[serde(default = "default_kind")]
    pub kind: RecordKind,
    #[serde(default)]
    pub language_id: i32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
    /// `{base}`, `{id}` and `{page}` are substituted per record
    #[serde(default = "default_url_pattern")]
    pub url_pattern: String,
}

impl RecordsProviderConfig {
    pub fn from_value(key: &str, value: &serde_json::Value) -> SitemapResult<Self> {
        let value = if value.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            value.clone()
        };
        let config: Self = serde_json::from_value(value).map_err(|e| {
            SitemapError::InvalidConfiguration(format!("sitemap {}: {}", key, e))
        })?;
        if config.items_per_page == 0 {
            return Err(SitemapError::InvalidConfiguration(format!(
                "sitemap {}: items_per_page must be positive",
                key
            )));
        }
        Ok(config)
    }
}

/// Lists live records of one kind and language
pub struct RecordsSitemapProvider {
    db: DatabaseConnection,
    request: SitemapRequest,
    config: RecordsProviderConfig,
}

impl RecordsSitemapProvider {
    pub fn new(db: DatabaseConnection, request: SitemapRequest, config: RecordsProviderConfig) -> Self {
        Self { db, request, config }
    }

    fn query(&self) -> Select<Records> {
        Records::find()
            .filter(records::Column::Kind.eq(self.config.kind.as_str()))
            .filter(records::Column::LanguageId.eq(self.config.language_id))
            .filter(records::Column::Status.eq(String::from(RecordStatus::Live)))
    }

    fn loc(&self, record: &records::Model) -> String {
        let page = record.page_id.unwrap_or(record.id);
        self.config
            .url_pattern
            .replace("{base}", self.request.base_url.trim_end_matches('/'))
            .replace("{id}", &record.id.to_string())
            .replace("{page}", &page.to_string())
    }
}

#[async_trait]
impl SitemapDataProvider for RecordsSitemapProvider {
    async fn number_of_pages(&self) -> SitemapResult<usize> {
        let count = self
            .query()
            .count(&self.db)
            .await
            .map_err(RelationError::from)? as usize;
        Ok(count.div_ceil(self.config.items_per_page))
    }

    async fn last_modified(&self) -> SitemapResult<Option<DateTime<Utc>>> {
        let latest = self
            .query()
            .order_by_desc(records::Column::UpdatedAt)
            .one(&self.db)
            .await
            .map_err(RelationError::from)?;
        Ok(latest.map(|r| r.updated_at))
    }

    async fn items(&self, page: usize) -> SitemapResult<Vec<SitemapItem>> {
        let per_page = self.config.items_per_page as u64;
        let rows = self
            .query()
            .order_by_asc(records::Column::Id)
            .offset(page as u64 * per_page)
            .limit(per_page)
            .all(&self.db)
            .await
            .map_err(RelationError::from)?;

        Ok(rows
            .iter()
            .map(|record| SitemapItem {
                loc: self.loc(record),
                last_mod: Some(record.updated_at),
            })
            .collect())
    }
}
