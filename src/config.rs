//! Run and portal configuration.
//!
//! Both values are built once at startup and only borrowed afterwards.

use crate::error::ConfigError;
use crate::models::PropertyType;
use crate::scrapers::types::SelectorConfig;
use anyhow::Context;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.portalinmobiliario.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// What to search for and how far to paginate
#[derive(Debug, Clone)]
pub struct RunConfig {
    comuna: String,
    property_type: PropertyType,
    max_pages: NonZeroU32,
    per_page_timeout: Duration,
}

impl RunConfig {
    pub fn new(
        comuna: &str,
        property_type: &str,
        max_pages: u32,
        per_page_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let comuna = normalize_comuna(comuna);
        if comuna.is_empty() {
            return Err(ConfigError::EmptyComuna);
        }

        let property_type = property_type
            .parse::<PropertyType>()
            .map_err(ConfigError::UnknownPropertyType)?;

        let max_pages = NonZeroU32::new(max_pages).ok_or(ConfigError::InvalidMaxPages)?;

        if per_page_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            comuna,
            property_type,
            max_pages,
            per_page_timeout,
        })
    }

    /// Normalized comuna slug, e.g. "las-condes"
    pub fn comuna(&self) -> &str {
        &self.comuna
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages.get()
    }

    pub fn per_page_timeout(&self) -> Duration {
        self.per_page_timeout
    }

    /// First results page, e.g. `/venta/departamento/las-condes-metropolitana`
    pub fn search_url(&self, portal: &PortalConfig) -> Result<Url, ConfigError> {
        let base = portal.base_url()?;
        let path = format!(
            "venta/{}/{}-metropolitana",
            self.property_type.slug(),
            self.comuna
        );
        base.join(&path).map_err(|source| ConfigError::PortalUrl {
            url: format!("{base}{path}"),
            source,
        })
    }
}

/// "  Las   Condes " -> "las-condes"
pub fn normalize_comuna(comuna: &str) -> String {
    comuna
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Waits used while driving a real browser
#[derive(Debug, Clone)]
pub struct BrowserTiming {
    pub page_load_wait: Duration,
    pub scroll_pause: Duration,
    pub max_scroll_attempts: u32,
    pub after_navigation_wait: Duration,
}

impl Default for BrowserTiming {
    fn default() -> Self {
        Self {
            page_load_wait: Duration::from_secs(2),
            scroll_pause: Duration::from_millis(500),
            max_scroll_attempts: 10,
            after_navigation_wait: Duration::from_secs(2),
        }
    }
}

/// Everything the page providers need to know about the portal
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub user_agent: String,
    pub headless: bool,
    pub timing: BrowserTiming,
    pub selectors: SelectorConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headless: true,
            timing: BrowserTiming::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl PortalConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::PortalUrl {
            url: self.base_url.clone(),
            source,
        })
    }
}

/// Load a selector override file; roles it leaves out keep their defaults.
pub fn load_selectors(path: &Path) -> anyhow::Result<SelectorConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selector file {}", path.display()))?;
    let mut selectors: SelectorConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse selector file {}", path.display()))?;

    for (role, default) in SelectorConfig::default().roles {
        selectors.roles.entry(role).or_insert(default);
    }

    Ok(selectors)
}
