use crate::config::PortalConfig;
use crate::error::{Phase, ProviderError};
use crate::scrapers::deadline::Attempt;
use crate::scrapers::html::{CardSelectors, HtmlSnapshot};
use crate::scrapers::traits::{CardNode, PageSnapshotProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Page provider fetching result pages as static HTML.
///
/// No JavaScript runs, so lazily rendered cards may be missing; pagination
/// follows the next control's link target instead of clicking it.
pub struct HttpProvider {
    client: Client,
    selectors: CardSelectors,
}

impl HttpProvider {
    pub fn new(portal: &PortalConfig, selectors: CardSelectors) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&portal.user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, selectors })
    }

    async fn fetch(&self, url: &Url, attempt: &Attempt) -> Result<HtmlSnapshot, ProviderError> {
        debug!(url = %url, "Fetching URL");

        let response = self
            .client
            .get(url.clone())
            .timeout(attempt.remaining()?)
            .send()
            .await
            .map_err(|e| reqwest_error(attempt, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(attempt.fail(format!("{url} returned status {status}")));
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(|e| reqwest_error(attempt, e))?;
        debug!(bytes = html.len(), "Downloaded HTML");

        Ok(HtmlSnapshot::parse(final_url, &html, &self.selectors))
    }
}

fn reqwest_error(attempt: &Attempt, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        attempt.timed_out()
    } else {
        attempt.fail(error)
    }
}

#[async_trait(?Send)]
impl PageSnapshotProvider for HttpProvider {
    type Snapshot = HtmlSnapshot;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&mut self, url: &Url, deadline: Instant) -> Result<HtmlSnapshot, ProviderError> {
        info!(url = %url, "📄 Fetching page...");
        self.fetch(url, &Attempt::new(Phase::Render, deadline)).await
    }

    fn list_card_nodes<'s>(&'s self, snapshot: &'s HtmlSnapshot) -> Vec<Box<dyn CardNode + 's>> {
        self.selectors
            .cards(snapshot.document())
            .into_iter()
            .map(|card| Box::new(card) as Box<dyn CardNode + 's>)
            .collect()
    }

    /// An enabled control without a link still counts; following it then
    /// fails as a navigation error instead of ending the run quietly.
    fn has_next_page(&self, snapshot: &HtmlSnapshot) -> bool {
        snapshot.next_control().is_some()
    }

    async fn go_to_next_page(
        &mut self,
        snapshot: &HtmlSnapshot,
        deadline: Instant,
    ) -> Result<HtmlSnapshot, ProviderError> {
        let attempt = Attempt::new(Phase::Advance, deadline);
        let target = snapshot
            .next_control()
            .and_then(|next| next.href.clone())
            .ok_or_else(|| attempt.fail("next-page control has no link target"))?;

        info!(url = %target, "🔄 Following 'Siguiente'...");
        self.fetch(&target, &attempt.enter(Phase::Render)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::types::SelectorConfig;
    use std::time::Duration;

    const BUTTON_ONLY_PAGE: &str = r#"
        <ol>
          <li class="ui-search-layout__item"><a href="/MLC-1-depto">Depto</a></li>
        </ol>
        <nav><button type="button">Siguiente</button></nav>
    "#;

    fn provider_and_snapshot(html: &str) -> (HttpProvider, HtmlSnapshot) {
        let config = SelectorConfig::default();
        let page = "https://www.portalinmobiliario.com/venta/casa/providencia-metropolitana";
        let page = Url::parse(page).unwrap();
        let snapshot = HtmlSnapshot::parse(page, html, &CardSelectors::compile(&config).unwrap());
        let provider = HttpProvider::new(
            &PortalConfig::default(),
            CardSelectors::compile(&config).unwrap(),
        )
        .unwrap();
        (provider, snapshot)
    }

    #[test]
    fn next_control_without_link_still_has_a_next_page() {
        let (provider, snapshot) = provider_and_snapshot(BUTTON_ONLY_PAGE);
        assert!(provider.has_next_page(&snapshot));
    }

    #[test]
    fn last_page_has_no_next_page() {
        let (provider, snapshot) = provider_and_snapshot("<ol><li>Depto</li></ol>");
        assert!(!provider.has_next_page(&snapshot));
    }

    #[tokio::test]
    async fn following_a_linkless_control_is_an_advance_failure() {
        let (mut provider, snapshot) = provider_and_snapshot(BUTTON_ONLY_PAGE);
        let deadline = Instant::now() + Duration::from_secs(30);

        let err = match provider.go_to_next_page(&snapshot, deadline).await {
            Err(err) => err,
            Ok(_) => panic!("expected the advance to fail"),
        };
        assert_eq!(err.phase(), Phase::Advance);
        assert!(err.to_string().contains("no link target"));
    }
}
