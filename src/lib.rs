pub mod common;
pub mod config;
pub mod engine;
pub mod harness;
pub mod sitemap;

pub mod database;
pub mod errors;
pub mod services;

pub use config::EngineConfig;
pub use engine::RelationEngine;
pub use errors::{RelationError, RelationResult, SitemapError, SitemapResult};
