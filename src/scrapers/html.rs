//! HTML-backed snapshots and card nodes shared by the browser and HTTP providers.

use crate::error::{ConfigError, NodeError};
use crate::scrapers::traits::{CardNode, PageView};
use crate::scrapers::types::{SelectorConfig, SelectorRole};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

struct CompiledRole {
    selector: Selector,
    /// Lowercased; empty means every match counts
    keywords: Vec<String>,
}

impl CompiledRole {
    fn accepts(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// [`SelectorConfig`] compiled once per run
pub struct CardSelectors {
    candidates: Vec<(String, Selector)>,
    min_cards: usize,
    roles: HashMap<SelectorRole, CompiledRole>,
    next_button: Vec<Selector>,
    next_button_texts: Vec<String>,
    disabled_classes: Vec<String>,
    no_results: Option<Selector>,
    clickable: Selector,
}

fn compile(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl CardSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        if config.card_candidates.is_empty() {
            return Err(ConfigError::NoCardSelectors);
        }

        let candidates = config
            .card_candidates
            .iter()
            .map(|css| Ok((css.clone(), compile(css)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut roles = HashMap::new();
        for (role, role_selector) in &config.roles {
            roles.insert(
                *role,
                CompiledRole {
                    selector: compile(&role_selector.css)?,
                    keywords: role_selector.keywords.iter().map(|k| k.to_lowercase()).collect(),
                },
            );
        }

        let next_button = config
            .next_button
            .iter()
            .map(|css| compile(css))
            .collect::<Result<Vec<_>, _>>()?;

        let no_results = config.no_results.as_deref().map(compile).transpose()?;

        Ok(Self {
            candidates,
            min_cards: config.min_cards_per_candidate,
            roles,
            next_button,
            next_button_texts: config
                .next_button_texts
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            disabled_classes: config.disabled_classes.clone(),
            no_results,
            clickable: compile("a, button")?,
        })
    }

    /// Card elements of `document`.
    ///
    /// The first candidate reaching the minimum count wins; a short last page
    /// falls back to the first candidate that matched anything.
    pub fn cards<'a>(&'a self, document: &'a Html) -> Vec<HtmlCard<'a>> {
        let mut fallback: Option<(&str, Vec<ElementRef<'a>>)> = None;

        for (css, selector) in &self.candidates {
            let found: Vec<ElementRef<'a>> = document.select(selector).collect();
            if !found.is_empty() && found.len() >= self.min_cards {
                debug!(selector = %css, count = found.len(), "Using card selector");
                return self.wrap(found);
            }
            if fallback.is_none() && !found.is_empty() {
                fallback = Some((css.as_str(), found));
            }
        }

        match fallback {
            Some((css, found)) => {
                debug!(selector = %css, count = found.len(), "Using card selector below threshold");
                self.wrap(found)
            }
            None => Vec::new(),
        }
    }

    fn wrap<'a>(&'a self, elements: Vec<ElementRef<'a>>) -> Vec<HtmlCard<'a>> {
        elements
            .into_iter()
            .map(|element| HtmlCard {
                element,
                selectors: self,
            })
            .collect()
    }

    fn next_control<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let by_selector = self
            .next_button
            .iter()
            .flat_map(|selector| document.select(selector));
        let by_text = document.select(&self.clickable).filter(|el| {
            let text = collapse(el.text()).to_lowercase();
            !text.is_empty() && self.next_button_texts.iter().any(|t| text.contains(t.as_str()))
        });

        by_selector.chain(by_text).find(|el| !self.is_disabled(el))
    }

    fn is_marked_disabled(&self, el: &ElementRef) -> bool {
        el.value()
            .classes()
            .any(|class| self.disabled_classes.iter().any(|d| d == class))
            || el.value().attr("aria-disabled") == Some("true")
    }

    fn is_disabled(&self, el: &ElementRef) -> bool {
        if self.is_marked_disabled(el) || el.value().attr("disabled").is_some() {
            return true;
        }
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "li")
            .map_or(false, |li| self.is_marked_disabled(&li))
    }
}

/// Enabled next-page control found on a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct NextControl {
    /// Absolute link target, when the control is a plain link
    pub href: Option<Url>,
}

/// Parsed HTML of one results page, captured after scrolling
pub struct HtmlSnapshot {
    url: Url,
    document: Html,
    empty_result: bool,
    next: Option<NextControl>,
}

impl HtmlSnapshot {
    pub fn parse(url: Url, html: &str, selectors: &CardSelectors) -> Self {
        let document = Html::parse_document(html);

        let empty_result = selectors
            .no_results
            .as_ref()
            .map_or(false, |s| document.select(s).next().is_some());

        let next = selectors.next_control(&document).map(|el| NextControl {
            href: el
                .value()
                .attr("href")
                .and_then(|href| url.join(href).ok())
                .filter(|target| matches!(target.scheme(), "http" | "https")),
        });

        Self {
            url,
            document,
            empty_result,
            next,
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn next_control(&self) -> Option<&NextControl> {
        self.next.as_ref()
    }
}

impl PageView for HtmlSnapshot {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    fn is_empty_result(&self) -> bool {
        self.empty_result
    }
}

/// One card element inside an [`HtmlSnapshot`]
pub struct HtmlCard<'a> {
    element: ElementRef<'a>,
    selectors: &'a CardSelectors,
}

impl<'a> HtmlCard<'a> {
    fn matches(&self, role: SelectorRole) -> Vec<(ElementRef<'a>, String)> {
        let Some(compiled) = self.selectors.roles.get(&role) else {
            return Vec::new();
        };
        self.element
            .select(&compiled.selector)
            .map(|el| (el, collapse(el.text())))
            .filter(|(_, text)| compiled.accepts(text))
            .collect()
    }
}

impl CardNode for HtmlCard<'_> {
    /// Marker roles join all matches, every other role yields its first match
    fn text(&self, role: SelectorRole) -> Result<Option<String>, NodeError> {
        let matches = self.matches(role);
        if matches.is_empty() {
            return Ok(None);
        }

        let mut texts = matches.into_iter().map(|(_, t)| t);
        if !role.collects_all() {
            return Ok(texts.next());
        }

        let joined: Vec<String> = texts.filter(|t| !t.is_empty()).collect();
        Ok(Some(joined.join(" ")))
    }

    fn attribute(&self, role: SelectorRole, name: &str) -> Result<Option<String>, NodeError> {
        Ok(self
            .matches(role)
            .into_iter()
            .filter_map(|(el, _)| el.value().attr(name).map(str::trim))
            .find(|value| !value.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <ol>
          <li class="ui-search-layout__item">
            <div class="poly-card">
              <span class="poly-pill__pill">PROYECTO</span>
              <a href="/MLC-100-proyecto-las-condes">Proyecto Los Robles</a>
              <span class="poly-component__available-units">12 unidades disponibles</span>
            </div>
          </li>
          <li class="ui-search-layout__item">
            <div class="poly-card">
              <a href="https://www.portalinmobiliario.com/MLC-200-depto#position=2">Depto</a>
              <ul>
                <li class="poly-attributes_list__item">3 dormitorios</li>
                <li class="poly-attributes_list__item">2 baños</li>
                <li class="poly-attributes_list__item">
                  <span>85</span><span>m²</span> útiles
                </li>
              </ul>
              <span class="poly-component__location">  Av. Apoquindo 4500,   Las Condes </span>
            </div>
          </li>
        </ol>
        <nav class="andes-pagination">
          <li class="andes-pagination__button andes-pagination__button--next">
            <a href="/venta/departamento/las-condes-metropolitana/_Desde_49">Siguiente</a>
          </li>
        </nav>
        </body></html>
    "#;

    fn selectors(min_cards: usize) -> CardSelectors {
        let config = SelectorConfig {
            min_cards_per_candidate: min_cards,
            ..SelectorConfig::default()
        };
        CardSelectors::compile(&config).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://www.portalinmobiliario.com/venta/departamento/las-condes-metropolitana")
            .unwrap()
    }

    #[test]
    fn below_threshold_falls_back_to_first_matching_candidate() {
        let selectors = selectors(5);
        let snapshot = HtmlSnapshot::parse(page_url(), RESULTS_PAGE, &selectors);
        // "article" matches nothing, the li candidate matches two cards
        assert_eq!(selectors.cards(snapshot.document()).len(), 2);
    }

    #[test]
    fn reads_roles_from_cards() {
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), RESULTS_PAGE, &selectors);
        let cards = selectors.cards(snapshot.document());

        let project = &cards[0];
        assert_eq!(project.text(SelectorRole::Badge).unwrap().as_deref(), Some("PROYECTO"));
        assert_eq!(
            project.text(SelectorRole::AvailableUnits).unwrap().as_deref(),
            Some("12 unidades disponibles")
        );
        assert_eq!(project.text(SelectorRole::Bedrooms).unwrap(), None);

        let listing = &cards[1];
        assert_eq!(listing.text(SelectorRole::Badge).unwrap(), None);
        assert_eq!(
            listing.text(SelectorRole::Bedrooms).unwrap().as_deref(),
            Some("3 dormitorios")
        );
        assert_eq!(
            listing.text(SelectorRole::Bathrooms).unwrap().as_deref(),
            Some("2 baños")
        );
        assert_eq!(
            listing.text(SelectorRole::Surface).unwrap().as_deref(),
            Some("85 m² útiles")
        );
        assert_eq!(
            listing.text(SelectorRole::Location).unwrap().as_deref(),
            Some("Av. Apoquindo 4500, Las Condes")
        );
        assert_eq!(
            listing.href().unwrap().as_deref(),
            Some("https://www.portalinmobiliario.com/MLC-200-depto#position=2")
        );
    }

    #[test]
    fn location_reads_the_first_match_and_badges_join() {
        let html = r#"
            <ol>
              <li class="ui-search-layout__item">
                <span class="poly-pill__pill">NUEVO</span>
                <span class="poly-pill__pill">PROYECTO</span>
                <a href="/MLC-300-casa">Casa</a>
                <span class="poly-component__location">Los Dominicos, Las Condes</span>
                <span class="poly-component__location">Región Metropolitana</span>
              </li>
            </ol>
        "#;
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), html, &selectors);
        let cards = selectors.cards(snapshot.document());

        assert_eq!(
            cards[0].text(SelectorRole::Location).unwrap().as_deref(),
            Some("Los Dominicos, Las Condes")
        );
        assert_eq!(
            cards[0].text(SelectorRole::Badge).unwrap().as_deref(),
            Some("NUEVO PROYECTO")
        );
    }

    #[test]
    fn empty_units_component_still_counts_as_present() {
        let html = r#"
            <ol>
              <li class="ui-search-layout__item">
                <a href="/MLC-400-depto">Depto</a>
                <span class="poly-component__available-units"></span>
              </li>
            </ol>
        "#;
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), html, &selectors);
        let cards = selectors.cards(snapshot.document());

        assert_eq!(
            cards[0].text(SelectorRole::AvailableUnits).unwrap().as_deref(),
            Some("")
        );
    }

    #[test]
    fn detects_enabled_next_control() {
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), RESULTS_PAGE, &selectors);
        let next = snapshot.next_control().expect("next control");
        assert_eq!(
            next.href.as_ref().map(Url::as_str),
            Some("https://www.portalinmobiliario.com/venta/departamento/las-condes-metropolitana/_Desde_49")
        );
        assert!(!snapshot.is_empty_result());
    }

    #[test]
    fn disabled_next_control_is_ignored() {
        let html = r#"
            <nav class="andes-pagination">
              <li class="andes-pagination__button andes-pagination__button--next andes-pagination__button--disabled">
                <a href="/_Desde_97" aria-label="Siguiente">Siguiente</a>
              </li>
            </nav>
        "#;
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), html, &selectors);
        assert!(snapshot.next_control().is_none());

        let aria = r#"<a class="andes-pagination__link" aria-label="Siguiente" aria-disabled="true">Siguiente</a>"#;
        let snapshot = HtmlSnapshot::parse(page_url(), aria, &selectors);
        assert!(snapshot.next_control().is_none());
    }

    #[test]
    fn next_control_found_by_text() {
        let html = r#"<div><button type="button">Siguiente ›</button></div>"#;
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), html, &selectors);
        assert_eq!(snapshot.next_control(), Some(&NextControl { href: None }));
    }

    #[test]
    fn explicit_empty_result_is_detected() {
        let html = r#"<div class="ui-search-rescue">No hay publicaciones que coincidan</div>"#;
        let selectors = selectors(1);
        let snapshot = HtmlSnapshot::parse(page_url(), html, &selectors);
        assert!(snapshot.is_empty_result());
        assert!(selectors.cards(snapshot.document()).is_empty());
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let config = SelectorConfig {
            next_button: vec!["a[[".to_string()],
            ..SelectorConfig::default()
        };
        assert!(matches!(
            CardSelectors::compile(&config),
            Err(ConfigError::Selector { selector, .. }) if selector == "a[["
        ));
    }
}
