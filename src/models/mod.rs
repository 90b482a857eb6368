use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of property searched for on the portal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Departamento,
    Casa,
}

impl PropertyType {
    /// Path segment used by the portal's search URLs
    pub fn slug(&self) -> &'static str {
        match self {
            PropertyType::Departamento => "departamento",
            PropertyType::Casa => "casa",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "departamento" | "apartment" => Ok(PropertyType::Departamento),
            "casa" | "house" => Ok(PropertyType::Casa),
            other => Err(other.to_string()),
        }
    }
}

/// One individual listing scraped from a results page.
///
/// Only built for cards that passed the project / multi-unit filter, so
/// `url` is always an absolute, non-empty listing address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub url: String,
    pub bedroom_count: Option<u32>,
    pub bathroom_count: Option<u32>,
    /// Surface as printed on the card, units included (e.g. "54 m² útiles")
    pub surface_area: Option<String>,
    pub location: Option<String>,
}

impl Record {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bedroom_count: None,
            bathroom_count: None,
            surface_area: None,
            location: None,
        }
    }
}
