use crate::error::NodeError;
use crate::models::Record;
use crate::scrapers::traits::CardNode;
use crate::scrapers::types::SelectorRole;
use std::fmt;
use url::Url;

/// Badge text marking a development project
const PROJECT_MARKERS: &[&str] = &["proyecto"];
/// Badge text marking an offer of several units
const MULTI_UNIT_MARKERS: &[&str] = &["unidades disponibles", "units available"];

/// Why a card did not become a [`Record`]
#[derive(Debug)]
pub enum Rejected {
    ProjectOrMultiUnit,
    NoUrl,
    Unreadable(NodeError),
}

impl Rejected {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejected::ProjectOrMultiUnit => "project_or_multiunit",
            Rejected::NoUrl => "no_url",
            Rejected::Unreadable(_) => "unreadable",
        }
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejected::Unreadable(e) => write!(f, "{}: {e}", self.reason()),
            _ => f.write_str(self.reason()),
        }
    }
}

impl From<NodeError> for Rejected {
    fn from(e: NodeError) -> Self {
        Rejected::Unreadable(e)
    }
}

/// Turns one listing card into a [`Record`]
#[derive(Debug, Clone)]
pub struct AttributeExtractor {
    base_url: Url,
}

impl AttributeExtractor {
    /// `base_url` resolves relative listing links
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn extract(&self, node: &dyn CardNode) -> Result<Record, Rejected> {
        if is_project_or_multi_unit(node)? {
            return Err(Rejected::ProjectOrMultiUnit);
        }

        let url = node
            .href()?
            .and_then(|href| self.resolve(&href))
            .ok_or(Rejected::NoUrl)?;

        Ok(Record {
            url: url.into(),
            bedroom_count: node
                .text(SelectorRole::Bedrooms)?
                .as_deref()
                .and_then(leading_integer),
            bathroom_count: node
                .text(SelectorRole::Bathrooms)?
                .as_deref()
                .and_then(leading_integer),
            surface_area: verbatim(node.text(SelectorRole::Surface)?),
            location: verbatim(node.text(SelectorRole::Location)?),
        })
    }

    /// Absolute http(s) URL without the tracking fragment the portal appends
    fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let mut url = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.join(href).ok()?,
            Err(_) => return None,
        };

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        url.set_fragment(None);
        Some(url)
    }
}

fn contains_marker(text: &str, markers: &[&str]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

fn is_project_or_multi_unit(node: &dyn CardNode) -> Result<bool, NodeError> {
    if let Some(badge) = node.text(SelectorRole::Badge)? {
        if contains_marker(&badge, PROJECT_MARKERS) || contains_marker(&badge, MULTI_UNIT_MARKERS) {
            return Ok(true);
        }
    }
    // The units component only exists on multi-unit offers, whatever it says.
    Ok(node.text(SelectorRole::AvailableUnits)?.is_some())
}

/// "3 dormitorios" -> 3, "N/D" -> None
fn leading_integer(text: &str) -> Option<u32> {
    let token = text.split_whitespace().next()?;
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    token[..end].parse().ok()
}

fn verbatim(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
