use crate::config::{BrowserTiming, PortalConfig};
use crate::error::{Phase, ProviderError};
use crate::scrapers::deadline::Attempt;
use crate::scrapers::html::{CardSelectors, HtmlSnapshot};
use crate::scrapers::traits::{CardNode, PageSnapshotProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const POPUP_SCRIPT: &str = r#"
(() => {
    const labels = __LABELS__;
    let closed = 0;
    for (const el of document.querySelectorAll('button, [role="button"]')) {
        const text = (el.innerText || '').trim();
        const aria = el.getAttribute('aria-label') || '';
        if ((labels.includes(text) || labels.includes(aria)) && el.offsetParent !== null) {
            el.click();
            closed += 1;
        }
    }
    return closed;
})()
"#;

const NEXT_SCRIPT: &str = r#"
(() => {
    const selectors = __SELECTORS__;
    const texts = __TEXTS__;
    const disabledClasses = __DISABLED__;
    const marked = (el) => !!el && (
        disabledClasses.some((c) => el.classList.contains(c)) ||
        el.getAttribute('aria-disabled') === 'true'
    );
    const isDisabled = (el) => marked(el) || el.hasAttribute('disabled') || marked(el.closest('li'));
    const candidates = [];
    for (const selector of selectors) {
        candidates.push(...document.querySelectorAll(selector));
    }
    for (const el of document.querySelectorAll('a, button')) {
        const text = (el.innerText || '').trim().toLowerCase();
        if (text && texts.some((t) => text.includes(t))) {
            candidates.push(el);
        }
    }
    const next = candidates.find((el) => !isDisabled(el));
    if (!next) {
        return false;
    }
    next.scrollIntoView({ block: 'center' });
    next.click();
    return true;
})()
"#;

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn popup_script(labels: &[String]) -> String {
    POPUP_SCRIPT.replace("__LABELS__", &json_list(labels))
}

fn next_script(portal: &PortalConfig) -> String {
    let texts: Vec<String> = portal
        .selectors
        .next_button_texts
        .iter()
        .map(|t| t.to_lowercase())
        .collect();
    NEXT_SCRIPT
        .replace("__SELECTORS__", &json_list(&portal.selectors.next_button))
        .replace("__TEXTS__", &json_list(&texts))
        .replace("__DISABLED__", &json_list(&portal.selectors.disabled_classes))
}

/// Page provider driving one headless Chrome tab for the whole run.
///
/// The browser process is owned here and shut down when the provider is
/// dropped, whichever way the run ends.
pub struct BrowserProvider {
    _browser: Browser,
    tab: Arc<Tab>,
    selectors: CardSelectors,
    timing: BrowserTiming,
    popup_script: String,
    next_script: String,
    debug_dir: Option<PathBuf>,
    captured: u32,
}

impl BrowserProvider {
    /// Launch headless Chrome and open the tab used for every page
    pub fn launch(
        portal: &PortalConfig,
        selectors: CardSelectors,
        debug_dir: Option<PathBuf>,
    ) -> Result<Self> {
        info!(headless = portal.headless, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(portal.headless)
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_user_agent(&portal.user_agent, None, None)
            .context("Failed to set user agent")?;

        if let Some(dir) = &debug_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create debug directory {}", dir.display()))?;
        }

        Ok(Self {
            _browser: browser,
            tab,
            selectors,
            timing: portal.timing.clone(),
            popup_script: popup_script(&portal.selectors.popup_closers),
            next_script: next_script(portal),
            debug_dir,
            captured: 0,
        })
    }

    fn arm(&self, attempt: &Attempt) -> Result<(), ProviderError> {
        self.tab.set_default_timeout(attempt.remaining()?);
        Ok(())
    }

    fn eval(
        &self,
        attempt: &Attempt,
        script: &str,
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        self.tab
            .evaluate(script, false)
            .map(|object| object.value)
            .map_err(|e| attempt.fail(format!("{e:#}")))
    }

    fn dismiss_popups(&self) {
        match self.tab.evaluate(&self.popup_script, false) {
            Ok(result) => {
                let closed = result.value.and_then(|v| v.as_u64()).unwrap_or(0);
                if closed > 0 {
                    debug!(closed, "Dismissed popups");
                }
            }
            Err(e) => debug!("Popup check failed: {e:#}"),
        }
    }

    fn scroll_height(&self, attempt: &Attempt) -> Result<u64, ProviderError> {
        Ok(self
            .eval(attempt, "document.body.scrollHeight")?
            .and_then(|v| v.as_f64())
            .map(|h| h as u64)
            .unwrap_or_default())
    }

    /// Scroll in steps until the page stops growing so lazy cards render
    async fn scroll_to_bottom(&self, attempt: &Attempt) -> Result<(), ProviderError> {
        let mut last_height = self.scroll_height(attempt)?;

        for _ in 0..self.timing.max_scroll_attempts {
            self.eval(attempt, "window.scrollTo(0, document.body.scrollHeight)")?;
            attempt.pause(self.timing.scroll_pause).await?;

            let height = self.scroll_height(attempt)?;
            if height == last_height {
                break;
            }
            last_height = height;
        }

        self.eval(attempt, "window.scrollTo(0, 0)")?;
        Ok(())
    }

    async fn render(&mut self, attempt: &Attempt) -> Result<HtmlSnapshot, ProviderError> {
        self.scroll_to_bottom(attempt).await?;

        let html = self
            .tab
            .get_content()
            .map_err(|e| attempt.fail(format!("{e:#}")))?;
        let url = Url::parse(&self.tab.get_url()).map_err(|e| attempt.fail(e))?;
        debug!(url = %url, bytes = html.len(), "Captured page HTML");

        self.captured += 1;
        self.save_debug_capture(&html);

        Ok(HtmlSnapshot::parse(url, &html, &self.selectors))
    }

    fn save_debug_capture(&self, html: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let html_path = dir.join(format!("page_{}.html", self.captured));
        if let Err(e) = std::fs::write(&html_path, html) {
            warn!("Could not save {}: {e}", html_path.display());
        }

        match self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        {
            Ok(png) => {
                let png_path = dir.join(format!("page_{}.png", self.captured));
                if let Err(e) = std::fs::write(&png_path, png) {
                    warn!("Could not save {}: {e}", png_path.display());
                }
            }
            Err(e) => warn!("Screenshot failed: {e:#}"),
        }
    }
}

#[async_trait(?Send)]
impl PageSnapshotProvider for BrowserProvider {
    type Snapshot = HtmlSnapshot;

    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn load(&mut self, url: &Url, deadline: Instant) -> Result<HtmlSnapshot, ProviderError> {
        let attempt = Attempt::new(Phase::Render, deadline);
        self.arm(&attempt)?;

        info!(url = %url, "📄 Loading page...");
        self.tab
            .navigate_to(url.as_str())
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| attempt.fail(format!("{e:#}")))?;

        attempt.pause(self.timing.page_load_wait).await?;
        self.dismiss_popups();

        self.render(&attempt).await
    }

    fn list_card_nodes<'s>(&'s self, snapshot: &'s HtmlSnapshot) -> Vec<Box<dyn CardNode + 's>> {
        self.selectors
            .cards(snapshot.document())
            .into_iter()
            .map(|card| Box::new(card) as Box<dyn CardNode + 's>)
            .collect()
    }

    fn has_next_page(&self, snapshot: &HtmlSnapshot) -> bool {
        snapshot.next_control().is_some()
    }

    async fn go_to_next_page(
        &mut self,
        snapshot: &HtmlSnapshot,
        deadline: Instant,
    ) -> Result<HtmlSnapshot, ProviderError> {
        let attempt = Attempt::new(Phase::Advance, deadline);
        if snapshot.next_control().is_none() {
            return Err(attempt.fail("no enabled next-page control"));
        }
        self.arm(&attempt)?;

        info!("🔄 Clicking 'Siguiente'...");
        self.dismiss_popups();

        let before = self.tab.get_url();
        let clicked = self
            .eval(&attempt, &self.next_script)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !clicked {
            return Err(attempt.fail("next-page control became unusable before the click"));
        }

        while self.tab.get_url() == before {
            attempt.pause(Duration::from_millis(100)).await?;
        }

        let attempt = attempt.enter(Phase::Render);
        self.tab
            .wait_until_navigated()
            .map_err(|e| attempt.fail(format!("{e:#}")))?;
        attempt.pause(self.timing.after_navigation_wait).await?;
        self.dismiss_popups();

        self.render(&attempt).await
    }
}

impl Drop for BrowserProvider {
    fn drop(&mut self) {
        info!(pages = self.captured, "Closing Chrome session");
        // The Chrome process itself is killed when `_browser` drops right after.
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_embed_escaped_configuration() {
        let portal = PortalConfig::default();
        let script = next_script(&portal);
        assert!(script.contains(r#"".andes-pagination__button--next a""#));
        assert!(script.contains(r#"a[title*=\"iguiente\"]"#));
        assert!(script.contains(r#"["siguiente"]"#));
        assert!(!script.contains("__SELECTORS__"));
        assert!(!script.contains("__TEXTS__"));
        assert!(!script.contains("__DISABLED__"));

        let popups = popup_script(&["Aceptar".to_string(), "It's \"ok\"".to_string()]);
        assert!(popups.contains(r#"["Aceptar","It's \"ok\""]"#));
    }
}
