use anyhow::Result;
use serde::Deserialize;
use std::env;

use crate::api::ebay::MAX_PAGE_SIZE;
use crate::api::Endpoints;
use crate::market::Credentials;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub marketplace: MarketplaceConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub sandbox_mode: bool,
    pub user_agent: String,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("sandbox_mode", &self.sandbox_mode)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl MarketplaceConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret.clone().unwrap_or_default(),
        )
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::for_environment(self.sandbox_mode)
    }
}

/// What happens to identifier results when the keyword fallback runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum FallbackPolicy {
    Merge,
    Replace,
}

impl TryFrom<String> for FallbackPolicy {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(FallbackPolicy::Merge),
            "replace" => Ok(FallbackPolicy::Replace),
            _ => Err(format!(
                "unknown fallback policy '{}', expected 'merge' or 'replace'",
                value
            )),
        }
    }
}

/// Where the fallback keyword query comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum KeywordSource {
    Identifier,
    Title,
}

impl TryFrom<String> for KeywordSource {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identifier" => Ok(KeywordSource::Identifier),
            "title" => Ok(KeywordSource::Title),
            _ => Err(format!(
                "unknown keyword source '{}', expected 'identifier' or 'title'",
                value
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub page_size: usize,
    pub fallback_threshold: usize,
    pub fallback_policy: FallbackPolicy,
    pub keyword_source: KeywordSource,
    pub title_keyword_limit: usize,
    pub sold_entries_per_page: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            fallback_threshold: 10,
            fallback_policy: FallbackPolicy::Merge,
            keyword_source: KeywordSource::Identifier,
            title_keyword_limit: 8,
            sold_entries_per_page: MAX_PAGE_SIZE,
        }
    }
}

impl SearchConfig {
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_sold_page_size(&self) -> usize {
        self.sold_entries_per_page.clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: String,
    pub request_timeout_secs: u64,
}

impl Config {
    /// Defaults, then `SCOUT_`-prefixed variables (`SCOUT_SEARCH__PAGE_SIZE=25`),
    /// then the marketplace credentials from `EBAY_CLIENT_ID` / `EBAY_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = SearchConfig::default();
        let settings = config::Config::builder()
            .set_default("marketplace.sandbox_mode", false)?
            .set_default(
                "marketplace.user_agent",
                format!("flip-scout/{}", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("search.page_size", defaults.page_size as i64)?
            .set_default("search.fallback_threshold", defaults.fallback_threshold as i64)?
            .set_default("search.fallback_policy", "merge")?
            .set_default("search.keyword_source", "identifier")?
            .set_default("search.title_keyword_limit", defaults.title_keyword_limit as i64)?
            .set_default(
                "search.sold_entries_per_page",
                defaults.sold_entries_per_page as i64,
            )?
            .set_default("server.port", 3000)?
            .set_default("server.log_level", "info")?
            .set_default("server.request_timeout_secs", 30)?
            .add_source(
                config::Environment::with_prefix("SCOUT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("marketplace.client_id", env::var("EBAY_CLIENT_ID").ok())?
            .set_override_option(
                "marketplace.client_secret",
                env::var("EBAY_CLIENT_SECRET").ok(),
            )?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
