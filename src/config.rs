use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{RelationError, RelationResult};

/// Engine configuration, usually read from `relkeeper.yaml`.
///
/// Every section has defaults so a partial file (or none at all) is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub localization: LocalizationConfig,
    pub relations: RelationConfig,
    pub copy: CopyConfig,
    pub sitemap: SitemapConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    pub path: Option<String>,
}

/// What a localization cascade (and the overlay in `resolve`) does when a
/// related record has no counterpart in the requested language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Abort the cascade; hide untranslated records when resolving
    Strict,
    /// Keep pointing at the default-language record
    #[default]
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub fallback: Option<FallbackPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    pub fallback: FallbackPolicy,
    /// Prefix for localized titles, `{language}` is replaced by the language title
    pub title_prefix: String,
    pub languages: Vec<LanguageConfig>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::Permissive,
            title_prefix: "[Translate to {language}:] ".to_string(),
            languages: Vec::new(),
        }
    }
}

impl LocalizationConfig {
    pub fn language(&self, id: i32) -> Option<&LanguageConfig> {
        self.languages.iter().find(|l| l.id == id)
    }

    pub fn fallback_for(&self, language: i32) -> FallbackPolicy {
        self.language(language)
            .and_then(|l| l.fallback)
            .unwrap_or(self.fallback)
    }

    pub fn localized_title(&self, title: &str, language: i32) -> RelationResult<String> {
        let lang = self.language(language).ok_or_else(|| {
            RelationError::InvalidConfiguration(format!("language {} is not configured", language))
        })?;
        Ok(format!(
            "{}{}",
            self.title_prefix.replace("{language}", &lang.title),
            title
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Surface `DuplicateRelation` to the caller
    #[default]
    Reject,
    /// Treat adding an existing relation as a no-op
    Ignore,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Appended to top-level copies whose title already exists on the
    /// destination page; `{n}` is the copy counter
    pub suffix_template: String,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            suffix_template: " (copy {n})".to_string(),
        }
    }
}

impl CopyConfig {
    pub fn copy_title(&self, title: &str, n: usize) -> String {
        format!("{}{}", title, self.suffix_template.replace("{n}", &n.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    /// Stylesheet referenced from rendered documents
    pub xsl_file: Option<String>,
    /// Keyed by sitemap type (`xmlSitemap`, ...)
    pub types: IndexMap<String, SitemapTypeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapTypeConfig {
    pub sitemaps: IndexMap<String, SitemapEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapEntryConfig {
    /// Name the provider was registered under
    pub provider: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub template: Option<String>,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RelationResult<()> {
        let mut seen = HashSet::new();
        for lang in &self.localization.languages {
            if lang.id <= 0 {
                return Err(RelationError::InvalidConfiguration(format!(
                    "language id {} is reserved for the default language",
                    lang.id
                )));
            }
            if !seen.insert(lang.id) {
                return Err(RelationError::InvalidConfiguration(format!(
                    "language id {} configured twice",
                    lang.id
                )));
            }
        }

        if !self.copy.suffix_template.contains("{n}") {
            return Err(RelationError::InvalidConfiguration(
                "copy.suffix_template must contain {n}".to_string(),
            ));
        }

        for (sitemap_type, type_config) in &self.sitemap.types {
            for (key, entry) in &type_config.sitemaps {
                if entry.provider.trim().is_empty() {
                    return Err(RelationError::InvalidConfiguration(format!(
                        "sitemap {}.{} has no provider",
                        sitemap_type, key
                    )));
                }
            }
        }

        Ok(())
    }
}
