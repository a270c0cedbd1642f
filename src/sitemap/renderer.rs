use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::provider::{SitemapItem, SitemapRequest};
use super::registry::SitemapRegistry;
use crate::common::get_handlebars;
use crate::config::{SitemapConfig, SitemapEntryConfig};
use crate::errors::{SitemapError, SitemapResult};

pub const DEFAULT_SITEMAP_TYPE: &str = "xmlSitemap";

const INDEX_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
{{#if (exists xslFile)}}<?xml-stylesheet type="text/xsl" href="{{xslFile}}"?>
{{/if}}<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{{#each sitemaps as |sitemap|}}    <sitemap>
        <loc>{{sitemap.loc}}</loc>
{{#if (exists sitemap.lastMod)}}        <lastmod>{{sitemap.lastMod}}</lastmod>
{{/if}}    </sitemap>
{{/each}}</sitemapindex>
"#;

const SITEMAP_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
{{#if (exists xslFile)}}<?xml-stylesheet type="text/xsl" href="{{xslFile}}"?>
{{/if}}<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{{#each items as |item|}}    <url>
        <loc>{{item.loc}}</loc>
{{#if (exists item.lastMod)}}        <lastmod>{{item.lastMod}}</lastmod>
{{/if}}    </url>
{{/each}}</urlset>
"#;

/// XML entity escaping; unlike the HTML default, `=` is left alone
fn xml_escape(data: &str) -> String {
    let mut escaped = String::with_capacity(data.len());
    for c in data.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    key: String,
    page: usize,
    loc: String,
    last_mod: Option<chrono::DateTime<chrono::Utc>>,
}

/// Renders the sitemap index or a single sitemap page as XML
pub struct XmlSitemapRenderer {
    config: SitemapConfig,
    registry: SitemapRegistry,
    handlebars: Handlebars<'static>,
}

impl XmlSitemapRenderer {
    pub fn new(config: SitemapConfig, registry: SitemapRegistry) -> SitemapResult<Self> {
        let mut handlebars = get_handlebars();
        handlebars.register_escape_fn(xml_escape);
        handlebars.register_template_string("Index", INDEX_TEMPLATE)?;
        handlebars.register_template_string("Sitemap", SITEMAP_TEMPLATE)?;

        Ok(Self {
            config,
            registry,
            handlebars,
        })
    }

    /// Add or replace a named template that sitemap entries can select
    pub fn register_template(&mut self, name: &str, source: &str) -> SitemapResult<()> {
        self.handlebars.register_template_string(name, source)?;
        Ok(())
    }

    /// Index when the request names no sitemap, otherwise that sitemap's page
    pub async fn render(
        &self,
        request: &SitemapRequest,
        sitemap_type: Option<&str>,
    ) -> SitemapResult<String> {
        let sitemap_type = sitemap_type.unwrap_or(DEFAULT_SITEMAP_TYPE);
        match request.sitemap.as_deref().filter(|s| !s.is_empty()) {
            Some(sitemap) => self.render_sitemap(request, sitemap, sitemap_type).await,
            None => self.render_index(request, sitemap_type).await,
        }
    }

    async fn render_index(&self, request: &SitemapRequest, sitemap_type: &str) -> SitemapResult<String> {
        let mut sitemaps = Vec::new();
        if let Some(type_config) = self.config.types.get(sitemap_type) {
            for (key, entry) in &type_config.sitemaps {
                let provider = self
                    .registry
                    .create(&entry.provider, request, key, &entry.config)?;
                let pages = provider.number_of_pages().await?;
                let last_mod = provider.last_modified().await?;
                for page in 0..pages {
                    sitemaps.push(IndexEntry {
                        key: key.clone(),
                        page,
                        loc: request.sitemap_url(key, page),
                        last_mod,
                    });
                }
            }
        }

        debug!("Sitemap index for {} lists {} pages", sitemap_type, sitemaps.len());
        let data = json!({
            "type": request.page_type,
            "sitemapType": sitemap_type,
            "xslFile": self.config.xsl_file,
            "sitemaps": sitemaps,
        });
        Ok(self.handlebars.render("Index", &data)?)
    }

    fn entry(&self, sitemap_type: &str, sitemap: &str) -> SitemapResult<&SitemapEntryConfig> {
        self.config
            .types
            .get(sitemap_type)
            .and_then(|t| t.sitemaps.get(sitemap))
            .ok_or_else(|| {
                SitemapError::InvalidConfiguration(format!(
                    "No valid configuration found for sitemap {}",
                    sitemap
                ))
            })
    }

    async fn render_sitemap(
        &self,
        request: &SitemapRequest,
        sitemap: &str,
        sitemap_type: &str,
    ) -> SitemapResult<String> {
        let entry = self.entry(sitemap_type, sitemap)?;
        let provider = self
            .registry
            .create(&entry.provider, request, sitemap, &entry.config)?;
        let items: Vec<SitemapItem> = provider.items(request.page).await?;

        let template = entry
            .template
            .as_deref()
            .or_else(|| entry.config.get("template").and_then(|t| t.as_str()))
            .filter(|t| !t.is_empty())
            .unwrap_or("Sitemap");
        if !self.handlebars.has_template(template) {
            return Err(SitemapError::InvalidConfiguration(format!(
                "Unknown template {} for sitemap {}",
                template, sitemap
            )));
        }

        info!(
            "Rendering sitemap {} page {} ({} items)",
            sitemap,
            request.page,
            items.len()
        );
        let data = json!({
            "type": request.page_type,
            "sitemapType": sitemap_type,
            "xslFile": self.config.xsl_file,
            "items": items,
        });
        Ok(self.handlebars.render(template, &data)?)
    }
}
