//! Typed errors for the scraping engine.
//!
//! Per-card problems never leave the harvester; page-level problems stop
//! pagination and travel back with the partial result; configuration
//! problems stop the run before a browser or HTTP client is created.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Invalid run or portal configuration, detected before any page is requested.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("comuna cannot be empty")]
    EmptyComuna,

    #[error("max_pages must be at least 1")]
    InvalidMaxPages,

    #[error("unknown property type '{0}' (expected 'departamento' or 'casa')")]
    UnknownPropertyType(String),

    #[error("per-page timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("no card selectors configured")]
    NoCardSelectors,

    #[error("invalid portal url '{url}': {source}")]
    PortalUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Which suspension point a provider error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a page to load, render and scroll
    Render,
    /// Acting on the next-page control
    Advance,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Render => f.write_str("page render"),
            Phase::Advance => f.write_str("page advance"),
        }
    }
}

/// Failure reported by a page snapshot provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    #[error("{phase} failed: {message}")]
    Failed { phase: Phase, message: String },
}

impl ProviderError {
    pub fn phase(&self) -> Phase {
        match self {
            ProviderError::Timeout { phase, .. } | ProviderError::Failed { phase, .. } => *phase,
        }
    }
}

#[cfg(test)]
impl ProviderError {
    pub fn render(message: impl fmt::Display) -> Self {
        ProviderError::Failed {
            phase: Phase::Render,
            message: message.to_string(),
        }
    }

    pub fn advance(message: impl fmt::Display) -> Self {
        ProviderError::Failed {
            phase: Phase::Advance,
            message: message.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }
}

/// A card node whose text or attributes could not be read.
#[derive(Debug, Error)]
#[error("card node unreadable: {0}")]
pub struct NodeError(pub String);

/// Snapshot-level harvesting failure.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("no listing cards found on {url}")]
    NoListingCards { url: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

/// Why pagination stopped before the page budget or the last page was reached.
#[derive(Debug, Error)]
pub enum PageFailure {
    #[error("page {page} failed to load: {source}")]
    PageLoad {
        page: u32,
        #[source]
        source: LoadError,
    },

    #[error("could not advance past page {from_page}: {source}")]
    Navigation {
        from_page: u32,
        #[source]
        source: ProviderError,
    },
}

impl PageFailure {
    /// Page number whose records are missing from the result
    pub fn page(&self) -> u32 {
        match self {
            PageFailure::PageLoad { page, .. } => *page,
            PageFailure::Navigation { from_page, .. } => from_page + 1,
        }
    }
}
