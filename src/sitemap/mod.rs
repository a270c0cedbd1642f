//! XML sitemap rendering over registered data providers

pub mod provider;
pub mod records_provider;
pub mod registry;
pub mod renderer;

pub use provider::{SitemapDataProvider, SitemapItem, SitemapRequest};
pub use records_provider::{RecordsProviderConfig, RecordsSitemapProvider};
pub use registry::{ProviderFactory, SitemapRegistry};
pub use renderer::{XmlSitemapRenderer, DEFAULT_SITEMAP_TYPE};
