use crate::engine::extractor::AttributeExtractor;
use crate::error::HarvestError;
use crate::models::Record;
use crate::scrapers::traits::{PageSnapshotProvider, PageView};
use tracing::debug;

/// Accepted records of one page, in document order
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub accepted: Vec<Record>,
    pub rejected: usize,
}

impl HarvestOutcome {
    pub fn analyzed(&self) -> usize {
        self.accepted.len() + self.rejected
    }
}

/// Runs the extractor over every card of a snapshot
pub struct PageHarvester<'a> {
    extractor: &'a AttributeExtractor,
}

impl<'a> PageHarvester<'a> {
    pub fn new(extractor: &'a AttributeExtractor) -> Self {
        Self { extractor }
    }

    /// Fails only when the page has no cards at all and does not say the
    /// search is empty; a bad card is counted and skipped.
    pub fn harvest<P: PageSnapshotProvider>(
        &self,
        provider: &P,
        snapshot: &P::Snapshot,
    ) -> Result<HarvestOutcome, HarvestError> {
        let nodes = provider.list_card_nodes(snapshot);

        if nodes.is_empty() {
            if snapshot.is_empty_result() {
                debug!(url = snapshot.url(), "Portal reports no results");
                return Ok(HarvestOutcome::default());
            }
            return Err(HarvestError::NoListingCards {
                url: snapshot.url().to_string(),
            });
        }

        let mut outcome = HarvestOutcome::default();
        for (index, node) in nodes.iter().enumerate() {
            match self.extractor.extract(node.as_ref()) {
                Ok(record) => outcome.accepted.push(record),
                Err(rejected) => {
                    debug!(index, %rejected, "Skipped card");
                    outcome.rejected += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{cards, FakeCard, FakeProvider, FakeSnapshot};
    use crate::scrapers::types::SelectorRole;
    use url::Url;

    fn extractor() -> AttributeExtractor {
        AttributeExtractor::new(Url::parse("https://www.portalinmobiliario.com").unwrap())
    }

    fn snapshot(cards: Vec<FakeCard>) -> FakeSnapshot {
        FakeSnapshot {
            url: "https://www.portalinmobiliario.com/venta/casa/nunoa-metropolitana".to_string(),
            cards,
            has_next: false,
            empty_result: false,
        }
    }

    #[test]
    fn project_cards_are_counted_not_returned() {
        let mut page = cards(&["https://p.cl/MLC-1", "https://p.cl/MLC-2"]);
        page.insert(1, FakeCard::project("https://p.cl/MLC-9"));
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());

        let outcome = PageHarvester::new(&extractor)
            .harvest(&provider, &snapshot(page))
            .unwrap();

        let urls: Vec<_> = outcome.accepted.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["https://p.cl/MLC-1", "https://p.cl/MLC-2"]);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.analyzed(), 3);
    }

    #[test]
    fn bad_nodes_do_not_abort_the_page() {
        let page = vec![
            FakeCard::broken(),
            FakeCard::without_link(),
            FakeCard::listing("https://p.cl/MLC-3").with(SelectorRole::Bedrooms, "N/D"),
        ];
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());

        let outcome = PageHarvester::new(&extractor)
            .harvest(&provider, &snapshot(page))
            .unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].bedroom_count, None);
        assert_eq!(outcome.rejected, 2);
    }

    #[test]
    fn duplicates_within_a_page_are_kept() {
        let page = cards(&["https://p.cl/MLC-1", "https://p.cl/MLC-1"]);
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());

        let outcome = PageHarvester::new(&extractor)
            .harvest(&provider, &snapshot(page))
            .unwrap();
        assert_eq!(outcome.accepted.len(), 2);
    }

    #[test]
    fn page_without_cards_is_an_error() {
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());

        let err = PageHarvester::new(&extractor)
            .harvest(&provider, &snapshot(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, HarvestError::NoListingCards { url } if url.contains("nunoa")));
    }

    #[test]
    fn declared_empty_result_is_not_an_error() {
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());
        let empty = FakeSnapshot {
            empty_result: true,
            ..snapshot(Vec::new())
        };

        let outcome = PageHarvester::new(&extractor)
            .harvest(&provider, &empty)
            .unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn all_rejected_page_is_a_valid_empty_harvest() {
        let page = vec![FakeCard::project("https://p.cl/MLC-7")];
        let extractor = extractor();
        let provider = FakeProvider::new(Vec::new());

        let outcome = PageHarvester::new(&extractor)
            .harvest(&provider, &snapshot(page))
            .unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected, 1);
    }
}
