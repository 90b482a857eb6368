use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parts of a listing card the extractor asks for.
///
/// How a role maps onto the page (CSS, keyword filters) belongs to the
/// provider's [`SelectorConfig`], never to the extractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelectorRole {
    /// Title pills such as "PROYECTO"
    Badge,
    /// "N unidades disponibles" component of multi-unit offers
    AvailableUnits,
    Bedrooms,
    Bathrooms,
    Surface,
    Location,
    PrimaryLink,
}

impl SelectorRole {
    /// Marker roles read every matching element; value roles read the first one
    pub fn collects_all(self) -> bool {
        matches!(self, SelectorRole::Badge | SelectorRole::AvailableUnits)
    }
}

/// CSS for one role, optionally narrowed to elements whose text contains a keyword
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleSelector {
    pub css: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl RoleSelector {
    pub fn css(css: &str) -> Self {
        Self {
            css: css.to_string(),
            keywords: Vec::new(),
        }
    }

    pub fn keyed(css: &str, keywords: &[&str]) -> Self {
        Self {
            css: css.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Page structure of the portal's result pages.
///
/// Every field has a default, so a JSON override file only needs the keys
/// that changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Listing card selectors, tried in order
    pub card_candidates: Vec<String>,
    /// Matches a candidate needs before it is preferred over later ones
    pub min_cards_per_candidate: usize,
    pub roles: BTreeMap<SelectorRole, RoleSelector>,
    /// Next-page control selectors, tried in order
    pub next_button: Vec<String>,
    /// Link/button texts that also identify the next-page control
    pub next_button_texts: Vec<String>,
    /// Classes marking the next control (or its `li`) as disabled
    pub disabled_classes: Vec<String>,
    /// Notice the portal shows when a search has no results
    pub no_results: Option<String>,
    /// Button texts / aria-labels that dismiss popups and banners
    pub popup_closers: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        let attribute_item = ".poly-attributes_list__item";

        let mut roles = BTreeMap::new();
        roles.insert(SelectorRole::Badge, RoleSelector::css(".poly-pill__pill"));
        roles.insert(
            SelectorRole::AvailableUnits,
            RoleSelector::css(".poly-component__available-units"),
        );
        roles.insert(
            SelectorRole::Bedrooms,
            RoleSelector::keyed(attribute_item, &["dormitorio"]),
        );
        roles.insert(
            SelectorRole::Bathrooms,
            RoleSelector::keyed(attribute_item, &["baño", "bano"]),
        );
        roles.insert(
            SelectorRole::Surface,
            RoleSelector::keyed(attribute_item, &["m²", "m2"]),
        );
        roles.insert(
            SelectorRole::Location,
            RoleSelector::css(".poly-component__location"),
        );
        roles.insert(
            SelectorRole::PrimaryLink,
            RoleSelector::css(r#"a[href*="/MLC-"]"#),
        );

        Self {
            card_candidates: vec![
                "article".to_string(),
                r#"li[class*="ui-search-layout__item"]"#.to_string(),
                r#"div[class*="ui-search-result"]"#.to_string(),
                ".poly-card".to_string(),
            ],
            min_cards_per_candidate: 5,
            roles,
            next_button: vec![
                ".andes-pagination__button--next a".to_string(),
                "li.andes-pagination__button--next a".to_string(),
                r#"a.andes-pagination__link[aria-label*="iguiente"]"#.to_string(),
                r#"a[title*="iguiente"]"#.to_string(),
                r#"a[aria-label*="iguiente"]"#.to_string(),
                r#".ui-search-pagination a[aria-label*="Siguiente"]"#.to_string(),
            ],
            next_button_texts: vec!["Siguiente".to_string()],
            disabled_classes: vec![
                "disabled".to_string(),
                "andes-pagination__button--disabled".to_string(),
            ],
            no_results: Some(".ui-search-rescue".to_string()),
            popup_closers: vec![
                "Entendido".to_string(),
                "Aceptar".to_string(),
                "Acepto".to_string(),
                "Cerrar".to_string(),
                "Close".to_string(),
                "×".to_string(),
            ],
        }
    }
}
