//! Sitemap rendering errors

use thiserror::Error;

use super::RelationError;

#[derive(Error, Debug)]
pub enum SitemapError {
    /// Unknown sitemap, unregistered provider or unknown template.
    /// Surfaced immediately, never retried.
    #[error("Invalid sitemap configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Provider error: {0}")]
    Provider(#[from] RelationError),
}

impl From<handlebars::RenderError> for SitemapError {
    fn from(err: handlebars::RenderError) -> Self {
        SitemapError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for SitemapError {
    fn from(err: handlebars::TemplateError) -> Self {
        SitemapError::Template(err.to_string())
    }
}

impl SitemapError {
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, SitemapError::InvalidConfiguration(_))
    }
}
