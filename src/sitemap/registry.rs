use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::debug;

use super::provider::{SitemapDataProvider, SitemapRequest};
use super::records_provider::{RecordsProviderConfig, RecordsSitemapProvider};
use crate::errors::{SitemapError, SitemapResult};

/// Builds a provider for one sitemap key from its configuration block
pub type ProviderFactory = Arc<
    dyn Fn(&SitemapRequest, &str, &serde_json::Value) -> SitemapResult<Box<dyn SitemapDataProvider>>
        + Send
        + Sync,
>;

/// Providers registered by name; configuration refers to them by that name
#[derive(Clone, Default)]
pub struct SitemapRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl SitemapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `records` provider over `db`
    pub fn with_records_provider(db: DatabaseConnection) -> Self {
        let mut registry = Self::new();
        registry.register("records", move |request, key, config| {
            let config = RecordsProviderConfig::from_value(key, config)?;
            Ok(Box::new(RecordsSitemapProvider::new(
                db.clone(),
                request.clone(),
                config,
            )) as Box<dyn SitemapDataProvider>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SitemapRequest, &str, &serde_json::Value) -> SitemapResult<Box<dyn SitemapDataProvider>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!("Registered sitemap provider '{}'", name);
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate `provider` for sitemap `key`
    pub fn create(
        &self,
        provider: &str,
        request: &SitemapRequest,
        key: &str,
        config: &serde_json::Value,
    ) -> SitemapResult<Box<dyn SitemapDataProvider>> {
        let factory = self.factories.get(provider).ok_or_else(|| {
            SitemapError::InvalidConfiguration(format!("No valid provider set for {}", key))
        })?;
        factory(request, key, config)
    }
}
