use crate::error::{NodeError, ProviderError};
use crate::scrapers::types::SelectorRole;
use async_trait::async_trait;
use tokio::time::Instant;
use url::Url;

/// Read-only view of one listing card, valid for a single page visit
pub trait CardNode {
    /// Text of the element(s) playing `role`, whitespace-collapsed.
    /// `Ok(None)` when the card has no such element.
    fn text(&self, role: SelectorRole) -> Result<Option<String>, NodeError>;

    /// Attribute `name` of the first element playing `role` that carries it
    fn attribute(&self, role: SelectorRole, name: &str) -> Result<Option<String>, NodeError>;

    /// Link target of the card's primary link
    fn href(&self) -> Result<Option<String>, NodeError> {
        self.attribute(SelectorRole::PrimaryLink, "href")
    }
}

/// What the engine may ask of a snapshot without going through the provider
pub trait PageView {
    fn url(&self) -> &str;

    /// The portal explicitly reported an empty search result
    fn is_empty_result(&self) -> bool {
        false
    }
}

/// Source of rendered, fully scrolled result pages.
///
/// One provider holds one rendering session for a whole run; pages are
/// visited strictly one after another, so the trait is not `Send`.
/// Every suspending call receives the deadline it has to honour.
#[async_trait(?Send)]
pub trait PageSnapshotProvider {
    type Snapshot: PageView;

    /// Get the name of the provider
    fn name(&self) -> &'static str;

    /// Load `url` and return its rendered snapshot
    async fn load(&mut self, url: &Url, deadline: Instant) -> Result<Self::Snapshot, ProviderError>;

    /// Listing cards of `snapshot`, in document order
    fn list_card_nodes<'s>(&'s self, snapshot: &'s Self::Snapshot) -> Vec<Box<dyn CardNode + 's>>;

    /// Whether an enabled next-page control exists on `snapshot`
    fn has_next_page(&self, snapshot: &Self::Snapshot) -> bool;

    /// Activate the next-page control and return the new page's snapshot.
    /// Errors carry the phase (advance vs. render) they happened in.
    async fn go_to_next_page(
        &mut self,
        snapshot: &Self::Snapshot,
        deadline: Instant,
    ) -> Result<Self::Snapshot, ProviderError>;
}
